//! Errors raised while provisioning a volume and while loading configuration.
//!
//! [`ProvisionError`] names the phase that failed and prefixes its message
//! with that phase's intent; [`FailureKind`] buckets it for retry decisions.

use thiserror::Error;

use crate::compute::ClientError;
use crate::manifest::ManifestError;
use crate::provision::Phase;
use crate::waiter::WaitError;

/// Why a volume import did not complete. Every variant belongs to exactly one
/// [`Phase`] and its message starts with that phase's intent.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(
        "{intent}: listing availability zones: {0}",
        intent = Phase::LocatePlacement.intent()
    )]
    ListZones(#[source] ClientError),

    #[error(
        "{intent}: no available availability zones in region {region}",
        intent = Phase::LocatePlacement.intent()
    )]
    NoAvailabilityZones { region: String },

    #[error("{intent}: {0}", intent = Phase::FetchManifest.intent())]
    Manifest(#[from] ManifestError),

    #[error("{intent}: {0}", intent = Phase::SubmitImport.intent())]
    Submit(#[source] ClientError),

    /// The service answered without an identifier the workflow depends on.
    #[error("{intent}: {what} nil", intent = .phase.intent())]
    MissingIdentifier { phase: Phase, what: &'static str },

    #[error(
        "{intent} (task {task_id}): {source}",
        intent = Phase::WaitForImport.intent()
    )]
    ImportWait {
        task_id: String,
        #[source]
        source: WaitError,
    },

    #[error(
        "{intent}: fetching volume ID from conversion task {task_id}: {source}",
        intent = Phase::ResolveVolume.intent()
    )]
    DescribeTask {
        task_id: String,
        #[source]
        source: ClientError,
    },

    #[error(
        "{intent}: waiting for volume {volume_id} to be available: {source}",
        intent = Phase::ResolveVolume.intent()
    )]
    VolumeWait {
        volume_id: String,
        #[source]
        source: WaitError,
    },
}

impl ProvisionError {
    /// The phase that failed.
    pub fn phase(&self) -> Phase {
        match self {
            ProvisionError::ListZones(_) | ProvisionError::NoAvailabilityZones { .. } => {
                Phase::LocatePlacement
            }
            ProvisionError::Manifest(_) => Phase::FetchManifest,
            ProvisionError::Submit(_) => Phase::SubmitImport,
            ProvisionError::MissingIdentifier { phase, .. } => *phase,
            ProvisionError::ImportWait { .. } => Phase::WaitForImport,
            ProvisionError::DescribeTask { .. } | ProvisionError::VolumeWait { .. } => {
                Phase::ResolveVolume
            }
        }
    }

    /// Coarse classification of the failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            ProvisionError::ListZones(_) | ProvisionError::NoAvailabilityZones { .. } => {
                FailureKind::Discovery
            }
            ProvisionError::Manifest(_) => FailureKind::Input,
            ProvisionError::Submit(_) | ProvisionError::DescribeTask { .. } => {
                FailureKind::Remote
            }
            ProvisionError::MissingIdentifier { .. } => FailureKind::Invariant,
            ProvisionError::ImportWait { source, .. }
            | ProvisionError::VolumeWait { source, .. } => match source {
                WaitError::Timeout { .. } => FailureKind::WaitTimeout,
                _ => FailureKind::WaitFailure,
            },
        }
    }
}

/// Classifies an import failure for the caller's retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// No placement target could be found.
    Discovery,
    /// The manifest was unreachable or malformed.
    Input,
    /// The service rejected a call.
    Remote,
    /// A service response omitted a required identifier.
    Invariant,
    /// A polled resource reached a failure state.
    WaitFailure,
    /// Polling ran out of attempts.
    WaitTimeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Discovery => write!(f, "Discovery"),
            FailureKind::Input => write!(f, "Input"),
            FailureKind::Remote => write!(f, "Remote"),
            FailureKind::Invariant => write!(f, "Invariant"),
            FailureKind::WaitFailure => write!(f, "WaitFailure"),
            FailureKind::WaitTimeout => write!(f, "WaitTimeout"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
