//! Error types for `pricewatch-core`.

use thiserror::Error;

use crate::run::RunId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("run not found: {0}")]
  RunNotFound(RunId),

  #[error("run {0} is not in progress")]
  RunNotActive(RunId),

  #[error("a run is already in progress for list {list_id:?} (run {run_id})")]
  RunInProgress { list_id: String, run_id: RunId },

  #[error("entity not found: {0:?}")]
  EntityNotFound(String),

  #[error("unknown subscription status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown run status: {0:?}")]
  UnknownRunStatus(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
