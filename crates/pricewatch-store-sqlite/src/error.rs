//! Error type for `pricewatch-store-sqlite`.

use pricewatch_core::run::RunId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] pricewatch_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// Another writer holds the database. Surfaced immediately — the store
  /// never retries internally; the caller decides.
  #[error("store is busy: another writer holds the database")]
  StoreBusy,

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("run not found: {0}")]
  RunNotFound(RunId),

  /// Attempted to finalize a run that already left the in-progress state.
  #[error("run {0} is not in progress")]
  RunNotActive(RunId),

  /// A run for this list is still open, possibly dangling after a crash.
  /// It must be finalized before a new one can begin.
  #[error("a run is already in progress for list {list_id:?} (run {run_id})")]
  RunInProgress { list_id: String, run_id: RunId },
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      code,
      _,
    )) = &e
      && matches!(
        code.code,
        rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
      )
    {
      return Self::StoreBusy;
    }
    Self::Database(e)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
