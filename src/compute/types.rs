//! Request and response bodies for the compute API.
//!
//! Field names are serialized in camelCase, which is also the form the
//! waiter paths (`conversionTasks[].state`, `volumes[].state`) refer to.

use serde::{Deserialize, Serialize};

/// An availability zone as returned by `describe_availability_zones`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityZone {
    pub zone_name: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeAvailabilityZonesOutput {
    #[serde(default)]
    pub availability_zones: Vec<AvailabilityZone>,
}

/// Body of the import-volume call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportVolumeRequest {
    pub availability_zone: String,
    pub image: DiskImageDetail,
    pub volume: VolumeDetail,
}

/// Where the disk image lives and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskImageDetail {
    pub import_manifest_url: String,
    pub format: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDetail {
    /// Size in GiB.
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportVolumeOutput {
    #[serde(default)]
    pub conversion_task: Option<ConversionTask>,
}

/// Lifecycle state of a conversion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionTaskState {
    Pending,
    Active,
    Completed,
    Cancelling,
    Cancelled,
}

/// A conversion task. Every field is optional on the wire; the importer checks
/// the ones it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionTask {
    #[serde(default)]
    pub conversion_task_id: Option<String>,
    #[serde(default)]
    pub state: Option<ConversionTaskState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_volume: Option<ImportVolumeTaskDetails>,
}

impl ConversionTask {
    /// Id of the volume the task produced, if the service has reported one.
    pub fn volume_id(&self) -> Option<&str> {
        self.import_volume
            .as_ref()
            .and_then(|details| details.volume.as_ref())
            .and_then(|volume| volume.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportVolumeTaskDetails {
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub volume: Option<DiskImageVolumeDescription>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskImageVolumeDescription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeConversionTasksOutput {
    #[serde(default)]
    pub conversion_tasks: Vec<ConversionTask>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeState {
    Creating,
    Available,
    InUse,
    Deleting,
    Deleted,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub volume_id: String,
    pub state: VolumeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescribeVolumesOutput {
    #[serde(default)]
    pub volumes: Vec<Volume>,
}
