//! Ordered phases of a volume import.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The five ordered phases of a volume import.
///
/// Each run flows through: LOCATE_PLACEMENT → FETCH_MANIFEST → SUBMIT_IMPORT
/// → WAIT_FOR_IMPORT → RESOLVE_VOLUME
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    LocatePlacement,
    FetchManifest,
    SubmitImport,
    WaitForImport,
    ResolveVolume,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::LocatePlacement,
        Phase::FetchManifest,
        Phase::SubmitImport,
        Phase::WaitForImport,
        Phase::ResolveVolume,
    ];

    /// The phase that follows this one, or `None` after the last.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::LocatePlacement => Some(Phase::FetchManifest),
            Phase::FetchManifest => Some(Phase::SubmitImport),
            Phase::SubmitImport => Some(Phase::WaitForImport),
            Phase::WaitForImport => Some(Phase::ResolveVolume),
            Phase::ResolveVolume => None,
        }
    }

    /// What the phase is doing, used as the prefix of its errors.
    pub fn intent(self) -> &'static str {
        match self {
            Phase::LocatePlacement => "locating an available availability zone",
            Phase::FetchManifest => "fetching import volume manifest",
            Phase::SubmitImport => "creating import volume task",
            Phase::WaitForImport => "waiting for volume to be imported",
            Phase::ResolveVolume => "resolving imported volume",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::LocatePlacement => write!(f, "LOCATE_PLACEMENT"),
            Phase::FetchManifest => write!(f, "FETCH_MANIFEST"),
            Phase::SubmitImport => write!(f, "SUBMIT_IMPORT"),
            Phase::WaitForImport => write!(f, "WAIT_FOR_IMPORT"),
            Phase::ResolveVolume => write!(f, "RESOLVE_VOLUME"),
        }
    }
}
