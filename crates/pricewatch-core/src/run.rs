//! Collection runs — one logical scrape session over a list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run identifier; the store's rowid.
pub type RunId = i64;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  InProgress,
  Completed,
  Failed,
}

/// The terminal state a caller finalizes a run into. A run leaves
/// `InProgress` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  Completed,
  Failed,
}

impl From<RunOutcome> for RunStatus {
  fn from(outcome: RunOutcome) -> Self {
    match outcome {
      RunOutcome::Completed => Self::Completed,
      RunOutcome::Failed => Self::Failed,
    }
  }
}

/// One collection session over a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
  pub id:             RunId,
  pub list_id:        String,
  pub started_at:     DateTime<Utc>,
  pub completed_at:   Option<DateTime<Utc>>,
  /// Number of observations recorded under this run.
  pub observed_count: u64,
  pub status:         RunStatus,
}

/// Aggregate counters over the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
  pub entities:          u64,
  pub completed_runs:    u64,
  pub history_points:    u64,
  /// Start time of the most recent completed run, if any.
  pub last_completed_at: Option<DateTime<Utc>>,
}
