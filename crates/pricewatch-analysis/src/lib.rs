//! Derived-signal queries over a Pricewatch tracker store.
//!
//! Everything here is read-only and total: a query over an empty store
//! returns an empty sequence, never an error. Errors that do occur are the
//! backing store's own and bubble through unchanged.

pub mod engine;
pub mod policy;
pub mod report;

pub use engine::Analyzer;
pub use policy::DropPolicy;
pub use report::{
  CategorizationIssue, FreeAccount, HistoricalLow, IssueKind, PriceChange,
  PriceDrop, TrendingDown,
};

#[cfg(test)]
mod tests;
