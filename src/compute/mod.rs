pub mod client;
pub mod error;
pub mod types;

pub use client::{ComputeClient, HttpComputeClient};
pub use error::ClientError;
pub use types::{
    AvailabilityZone, ConversionTask, ConversionTaskState, DescribeConversionTasksOutput,
    DescribeVolumesOutput, DiskImageDetail, ImportVolumeOutput, ImportVolumeRequest, Volume,
    VolumeDetail, VolumeState,
};
