//! Bookkeeping for a single import run and the record it leaves behind.
//!
//! [`ProvisionRun`] tracks completed phases while the import is in flight;
//! [`ProvisionRecord`] is the summary of a run that reached the end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::phase::Phase;

/// Mutable bookkeeping for one import while it runs.
#[derive(Debug, Clone)]
pub struct ProvisionRun {
    pub run_id: String,
    pub manifest_url: String,
    pub availability_zone: Option<String>,
    pub conversion_task_id: Option<String>,
    pub volume_id: Option<String>,
    pub completed: Vec<Phase>,
    pub started_at: DateTime<Utc>,
}

impl ProvisionRun {
    pub fn new(manifest_url: String) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            manifest_url,
            availability_zone: None,
            conversion_task_id: None,
            volume_id: None,
            completed: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// The phase that must run next, or `None` once every phase has completed.
    pub fn current(&self) -> Option<Phase> {
        match self.completed.last() {
            None => Some(Phase::LocatePlacement),
            Some(last) => last.next(),
        }
    }

    /// Marks `phase` as done. Phases must complete in order.
    pub fn complete(&mut self, phase: Phase) {
        debug_assert_eq!(self.current(), Some(phase), "phase completed out of order");
        self.completed.push(phase);
    }

    pub fn is_finished(&self) -> bool {
        self.current().is_none()
    }
}

/// Summary of a successful import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRecord {
    pub run_id: String,
    pub manifest_url: String,
    pub availability_zone: String,
    pub conversion_task_id: String,
    pub volume_id: String,
    pub phases: Vec<Phase>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl ProvisionRecord {
    /// Builds the record from a finished run. Returns `None` if the run has not
    /// completed every phase or is missing an identifier.
    pub fn from_run(run: &ProvisionRun) -> Option<Self> {
        if !run.is_finished() {
            return None;
        }
        let now = Utc::now();
        Some(Self {
            run_id: run.run_id.clone(),
            manifest_url: run.manifest_url.clone(),
            availability_zone: run.availability_zone.clone()?,
            conversion_task_id: run.conversion_task_id.clone()?,
            volume_id: run.volume_id.clone()?,
            phases: run.completed.clone(),
            started_at: run.started_at,
            completed_at: now,
            duration_ms: (now - run.started_at).num_milliseconds(),
        })
    }
}
