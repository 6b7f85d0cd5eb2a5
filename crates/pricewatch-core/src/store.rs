//! The `TrackerStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `pricewatch-store-sqlite`). Higher layers (`pricewatch-collector`,
//! `pricewatch-analysis`, the CLI) depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  entity::{Entity, Price, TaggedEntity},
  history::{HistoryPoint, Observation},
  membership::ListMembership,
  run::{Run, RunId, RunOutcome, StoreStats},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Which slice of the store a projection-shaped query covers.
///
/// Scoping to one run is a policy choice, not a technical constraint, so it
/// is an explicit parameter rather than a hidden filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScope {
  /// Every entity the store has ever seen.
  AllHistory,
  /// Only entities observed under the given run.
  Run(RunId),
}

/// What one [`TrackerStore::record`] call did.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
  /// The entity was created by this observation.
  pub new_entity:   bool,
  /// An identical `(handle, observed_at)` point already existed; nothing
  /// was written.
  pub deduped:      bool,
  /// The projection price moved: `(previous, current)`.
  pub price_change: Option<(Price, Price)>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Pricewatch storage backend.
///
/// History writes are append-only: every recorded observation becomes a new
/// history point, and the entity's current-state projection is derived from
/// the chronologically latest point. Tag membership changes are expressed as
/// open/close transitions, never as deletions.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait TrackerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Runs ──────────────────────────────────────────────────────────────

  /// Open a new run for `list_id` in the in-progress state.
  ///
  /// Refuses while another run for the same list is still in progress —
  /// including a dangling run left behind by a crash — so that the
  /// single-writer discipline is visible to the caller.
  fn begin_run<'a>(
    &'a self,
    list_id: &'a str,
  ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'a;

  /// Finalize a run exactly once. Errors if the run does not exist or has
  /// already left the in-progress state.
  fn end_run(
    &self,
    run_id: RunId,
    outcome: RunOutcome,
    observed_count: u64,
  ) -> impl Future<Output = Result<Run, Self::Error>> + Send + '_;

  /// Retrieve a run by id. Returns `None` if not found.
  fn run(
    &self,
    run_id: RunId,
  ) -> impl Future<Output = Result<Option<Run>, Self::Error>> + Send + '_;

  /// The most recently started completed run, optionally restricted to one
  /// list.
  fn latest_completed_run<'a>(
    &'a self,
    list_id: Option<&'a str>,
  ) -> impl Future<Output = Result<Option<Run>, Self::Error>> + Send + 'a;

  // ── Observations — append-only writes ─────────────────────────────────

  /// Durably record one observation under `run_id`.
  ///
  /// In a single transaction: appends a history point (idempotent on
  /// `(handle, observed_at)`), advances the entity projection unless the
  /// observation is older than what is already projected, and reconciles
  /// open tag memberships against the observation's tag set.
  fn record(
    &self,
    run_id: RunId,
    observation: Observation,
  ) -> impl Future<Output = Result<RecordOutcome, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve one entity's projection. Returns `None` if never observed.
  fn entity<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + 'a;

  /// All entities in scope, each with its currently-open tags.
  fn entities(
    &self,
    scope: RunScope,
  ) -> impl Future<Output = Result<Vec<TaggedEntity>, Self::Error>> + Send + '_;

  /// Full history for one entity, ascending by observation time.
  fn history<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Vec<HistoryPoint>, Self::Error>> + Send + 'a;

  /// History across all entities, ordered by handle then observation time.
  /// `since = None` returns everything.
  fn history_since(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<HistoryPoint>, Self::Error>> + Send + '_;

  /// Full membership history (open and closed rows) for one entity.
  fn memberships<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Vec<ListMembership>, Self::Error>> + Send + 'a;

  /// Aggregate counters. Total on an empty store.
  fn stats(
    &self,
  ) -> impl Future<Output = Result<StoreStats, Self::Error>> + Send + '_;
}
