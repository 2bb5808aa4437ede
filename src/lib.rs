//! Create block-storage volumes from remotely hosted machine-image manifests.
//!
//! [`VolumeImporter`] runs the import: pick an availability zone, fetch the
//! manifest, submit a conversion task, wait for it with the [`waiter`], then
//! wait for the resulting volume to become available.

pub mod cli;
pub mod compute;
pub mod config;
pub mod error;
pub mod importer;
pub mod manifest;
pub mod provision;
pub mod ui;
pub mod waiter;

pub use compute::{ComputeClient, HttpComputeClient};
pub use config::VolimportConfig;
pub use error::{FailureKind, ProvisionError};
pub use importer::{ImporterSettings, VolumeImporter};
pub use manifest::{HttpManifestFetcher, ImageManifest, ManifestSource};
pub use provision::{Phase, ProvisionRecord};
