//! Incremental collection of observations from a virtualized list surface.
//!
//! The collector consumes a [`ListSurface`] capability — "give me the
//! visible elements, reveal more, tell me when you've settled" — and streams
//! deduplicated observations into any
//! [`TrackerStore`](pricewatch_core::store::TrackerStore), one durable write
//! per fresh element. It knows nothing about browsers; the capability's
//! implementation lives with the caller.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
#![allow(async_fn_in_trait)]

pub mod collector;
pub mod retry;
pub mod surface;

pub use collector::{CollectSummary, Collector, CollectorConfig};
pub use retry::RetryPolicy;
pub use surface::{ListSurface, SurfaceError};

#[cfg(test)]
mod tests;
