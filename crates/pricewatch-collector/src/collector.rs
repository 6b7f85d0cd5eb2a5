//! The collection state machine: sweep, record, reveal, repeat.

use std::{collections::HashSet, time::Duration};

use pricewatch_core::{run::RunId, store::TrackerStore};
use pricewatch_extract::{RawCard, extract};
use tracing::{debug, info, warn};

use crate::{
  retry::RetryPolicy,
  surface::{ListSurface, SurfaceError},
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Knobs for one collector instance, passed in at construction.
#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
  /// Upper bound on each post-reveal wait; keeps a dead page from blocking
  /// the run indefinitely.
  pub settle_timeout: Duration,
  /// Consecutive sweeps with zero new identifiers before the list is
  /// considered exhausted.
  pub idle_rounds:    u32,
  /// Per-element retry on transient staleness.
  pub retry:          RetryPolicy,
  /// Pause between fresh-element writes; keeps the loop inside the host's
  /// tolerance. Pacing, not correctness.
  pub pace:           Duration,
}

impl Default for CollectorConfig {
  fn default() -> Self {
    Self {
      settle_timeout: Duration::from_secs(20),
      idle_rounds:    3,
      retry:          RetryPolicy::default(),
      pace:           Duration::from_millis(150),
    }
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What one collection run did.
#[derive(Debug, Default)]
pub struct CollectSummary {
  /// Fresh observations durably written.
  pub recorded:           u64,
  /// Elements skipped because their identifier was already seen this run.
  pub duplicates:         u64,
  /// Elements skipped after exhausting staleness retries.
  pub stale_skipped:      u64,
  /// Elements dropped for want of an identifier.
  pub missing_identifier: u64,
  /// Sweeps performed.
  pub rounds:             u32,
  /// Set when the browsing capability was lost mid-run. Everything already
  /// recorded stays durable.
  pub aborted:            Option<SurfaceError>,
}

impl CollectSummary {
  pub fn is_aborted(&self) -> bool { self.aborted.is_some() }
}

/// Phases of the run state machine, for trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Ready,
  Extracting,
  Scrolling,
  Done,
  Aborted,
}

// ─── Collector ───────────────────────────────────────────────────────────────

/// Drives the scroll/reveal loop against a [`ListSurface`], streaming every
/// fresh observation into the store before asking for more content.
pub struct Collector {
  config: CollectorConfig,
}

impl Collector {
  pub fn new(config: CollectorConfig) -> Self { Self { config } }

  /// Collect the list behind `surface` into `store` under `run_id`.
  ///
  /// Surface loss never returns an error — the summary carries the abort
  /// cause and the counts captured up to that point. Store errors (including
  /// contention) propagate immediately; the store is never retried here.
  pub async fn collect<L, S>(
    &self,
    surface: &mut L,
    store: &S,
    run_id: RunId,
  ) -> Result<CollectSummary, S::Error>
  where
    L: ListSurface,
    S: TrackerStore,
  {
    let mut seen: HashSet<String> = HashSet::new();
    let mut summary = CollectSummary::default();
    let mut idle = 0u32;
    let mut phase = Phase::Ready;

    loop {
      phase = transition(phase, Phase::Extracting);
      summary.rounds += 1;

      let handles = match surface.visible_cards().await {
        Ok(handles) => handles,
        Err(e) => {
          transition(phase, Phase::Aborted);
          summary.aborted = Some(e);
          return Ok(summary);
        }
      };

      let mut fresh = 0u64;
      for handle in &handles {
        let raw = match self.read_with_retry(surface, handle).await {
          Ok(Some(raw)) => raw,
          Ok(None) => {
            summary.stale_skipped += 1;
            continue;
          }
          Err(e) => {
            transition(phase, Phase::Aborted);
            summary.aborted = Some(e);
            return Ok(summary);
          }
        };

        let observation = match extract(&raw) {
          Ok(observation) => observation,
          Err(e) => {
            // Never fatal to the batch; count it and move on.
            summary.missing_identifier += 1;
            warn!(error = %e, "dropping element");
            continue;
          }
        };

        // Idempotent against the virtualization re-rendering rows we have
        // already extracted this run.
        if !seen.insert(observation.handle.clone()) {
          summary.duplicates += 1;
          continue;
        }

        // Written before the loop proceeds: a crash loses at most this one.
        let outcome = store.record(run_id, observation).await?;
        if outcome.deduped {
          summary.duplicates += 1;
        } else {
          summary.recorded += 1;
          fresh += 1;
        }

        if !self.config.pace.is_zero() {
          tokio::time::sleep(self.config.pace).await;
        }
      }

      if fresh == 0 {
        idle += 1;
      } else {
        idle = 0;
      }
      debug!(
        round = summary.rounds,
        fresh,
        idle,
        total = summary.recorded,
        "sweep finished"
      );

      if idle >= self.config.idle_rounds {
        transition(phase, Phase::Done);
        break;
      }

      phase = transition(phase, Phase::Scrolling);
      if let Err(e) = surface.reveal_more().await {
        transition(phase, Phase::Aborted);
        summary.aborted = Some(e);
        return Ok(summary);
      }

      match surface.wait_until_settled(self.config.settle_timeout).await {
        // No change within the bound is not an error; the next sweep will
        // simply find nothing new and count an idle round.
        Ok(_) | Err(SurfaceError::Timeout) => {}
        Err(e) if e.is_transient() => {}
        Err(e) => {
          transition(phase, Phase::Aborted);
          summary.aborted = Some(e);
          return Ok(summary);
        }
      }
    }

    info!(
      recorded = summary.recorded,
      duplicates = summary.duplicates,
      stale_skipped = summary.stale_skipped,
      missing_identifier = summary.missing_identifier,
      rounds = summary.rounds,
      "collection finished"
    );

    Ok(summary)
  }

  /// Read one element, retrying transient staleness per the policy.
  /// `Ok(None)` means the element stayed stale and is skipped.
  async fn read_with_retry<L: ListSurface>(
    &self,
    surface: &mut L,
    handle: &L::Handle,
  ) -> Result<Option<RawCard>, SurfaceError> {
    let RetryPolicy { max_attempts, backoff } = self.config.retry;
    let mut attempt = 0u32;

    loop {
      match surface.read_card(handle).await {
        Ok(raw) => return Ok(Some(raw)),
        Err(e) if e.is_transient() => {
          attempt += 1;
          if attempt >= max_attempts {
            warn!(attempts = attempt, "element stayed stale; skipping it");
            return Ok(None);
          }
          if !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
          }
        }
        Err(e) => return Err(e),
      }
    }
  }
}

fn transition(from: Phase, to: Phase) -> Phase {
  debug!(?from, ?to, "collector phase");
  to
}
