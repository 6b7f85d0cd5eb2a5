//! Error type for `pricewatch-extract`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The element exposed neither a profile link nor a username. Without an
  /// identifier the row cannot be deduplicated or stored, so it is dropped.
  #[error("element has no identifier (no profile link or username text)")]
  MissingIdentifier,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
