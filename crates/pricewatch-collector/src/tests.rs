//! Collector tests against a scripted surface and an in-memory store.

use std::time::Duration;

use pricewatch_core::{
  run::RunOutcome,
  store::{RunScope, TrackerStore},
};
use pricewatch_extract::RawCard;
use pricewatch_store_sqlite::SqliteStore;

use crate::{
  collector::{Collector, CollectorConfig},
  retry::RetryPolicy,
  surface::{ListSurface, SurfaceError},
};

// ─── Scripted surface ────────────────────────────────────────────────────────

struct Script {
  card:        RawCard,
  /// Reads that fail `Stale` before one succeeds.
  stale_reads: u32,
}

/// A surface that plays back pre-scripted windows of visible cards.
/// The final window repeats forever, as a real exhausted list would.
struct FakeSurface {
  cards:        Vec<Script>,
  windows:      Vec<Vec<usize>>,
  sweep:        usize,
  reveals:      u32,
  /// `visible_cards` fails with `Gone` once the sweep index reaches this.
  die_at_sweep: Option<usize>,
}

impl FakeSurface {
  fn new(cards: Vec<Script>, windows: Vec<Vec<usize>>) -> Self {
    Self { cards, windows, sweep: 0, reveals: 0, die_at_sweep: None }
  }

  fn window(&self) -> Vec<usize> {
    self
      .windows
      .get(self.sweep)
      .or_else(|| self.windows.last())
      .cloned()
      .unwrap_or_default()
  }
}

impl ListSurface for FakeSurface {
  type Handle = usize;

  async fn visible_cards(&mut self) -> Result<Vec<usize>, SurfaceError> {
    if let Some(at) = self.die_at_sweep
      && self.sweep >= at
    {
      return Err(SurfaceError::Gone("tab closed".into()));
    }
    Ok(self.window())
  }

  async fn read_card(&mut self, handle: &usize) -> Result<RawCard, SurfaceError> {
    let script = &mut self.cards[*handle];
    if script.stale_reads > 0 {
      script.stale_reads -= 1;
      return Err(SurfaceError::Stale);
    }
    Ok(script.card.clone())
  }

  async fn reveal_more(&mut self) -> Result<(), SurfaceError> {
    self.reveals += 1;
    self.sweep += 1;
    Ok(())
  }

  async fn wait_until_settled(
    &mut self,
    _timeout: Duration,
  ) -> Result<bool, SurfaceError> {
    Ok(true)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn card(handle: &str) -> Script {
  Script {
    card:        RawCard {
      profile_href:  Some(format!("/{handle}")),
      username_text: Some(format!("@{handle}")),
      display_name:  None,
      action_text:   Some("SUBSCRIBE $9.99 per month".into()),
      chip_labels:   vec!["paid".into()],
    },
    stale_reads: 0,
  }
}

fn identifier_less() -> Script {
  Script {
    card:        RawCard {
      action_text: Some("SUBSCRIBE $9.99 per month".into()),
      ..RawCard::default()
    },
    stale_reads: 0,
  }
}

fn fast_config() -> CollectorConfig {
  CollectorConfig {
    settle_timeout: Duration::from_millis(10),
    idle_rounds:    3,
    retry:          RetryPolicy { max_attempts: 3, backoff: Duration::ZERO },
    pace:           Duration::ZERO,
  }
}

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.expect("in-memory store")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fifty_elements_two_stale_one_identifierless() {
  let mut cards: Vec<Script> = (0..50).map(|i| card(&format!("user{i:02}"))).collect();
  cards[3].stale_reads = 1;
  cards[17].stale_reads = 1;
  cards[42] = identifier_less();

  let window: Vec<usize> = (0..50).collect();
  let mut surface = FakeSurface::new(cards, vec![window, vec![]]);

  let s = store().await;
  let run = s.begin_run("all").await.unwrap();

  let summary = Collector::new(fast_config())
    .collect(&mut surface, &s, run.id)
    .await
    .unwrap();

  assert_eq!(summary.recorded, 49);
  assert_eq!(summary.missing_identifier, 1);
  assert_eq!(summary.stale_skipped, 0, "retried elements recovered");
  assert!(!summary.is_aborted());

  let entities = s.entities(RunScope::AllHistory).await.unwrap();
  assert_eq!(entities.len(), 49);
}

#[tokio::test]
async fn overlapping_windows_deduplicate_by_identifier() {
  let cards = vec![card("alice"), card("bob"), card("carol")];
  let mut surface =
    FakeSurface::new(cards, vec![vec![0, 1], vec![1, 2], vec![]]);

  let s = store().await;
  let run = s.begin_run("all").await.unwrap();

  let summary = Collector::new(fast_config())
    .collect(&mut surface, &s, run.id)
    .await
    .unwrap();

  assert_eq!(summary.recorded, 3);
  assert_eq!(summary.duplicates, 1);

  // The re-rendered element produced no second history point.
  assert_eq!(s.history("bob").await.unwrap().len(), 1);
}

#[tokio::test]
async fn permanently_stale_element_is_skipped_not_fatal() {
  let mut cards = vec![card("alice"), card("bob")];
  cards[1].stale_reads = 99;

  let mut surface = FakeSurface::new(cards, vec![vec![0, 1], vec![]]);

  let s = store().await;
  let run = s.begin_run("all").await.unwrap();

  let summary = Collector::new(fast_config())
    .collect(&mut surface, &s, run.id)
    .await
    .unwrap();

  assert_eq!(summary.recorded, 1);
  assert_eq!(summary.stale_skipped, 1);
  assert!(s.entity("alice").await.unwrap().is_some());
  assert!(s.entity("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn surface_loss_preserves_already_written_records() {
  let cards = vec![card("alice"), card("bob"), card("carol")];
  let mut surface = FakeSurface::new(cards, vec![vec![0, 1], vec![2]]);
  surface.die_at_sweep = Some(1);

  let s = store().await;
  let run = s.begin_run("all").await.unwrap();

  let summary = Collector::new(fast_config())
    .collect(&mut surface, &s, run.id)
    .await
    .unwrap();

  assert!(matches!(summary.aborted, Some(SurfaceError::Gone(_))));
  assert_eq!(summary.recorded, 2);

  // Partial records are durable; the caller finalizes the run as failed.
  assert_eq!(s.entities(RunScope::AllHistory).await.unwrap().len(), 2);
  s.end_run(run.id, RunOutcome::Failed, summary.recorded)
    .await
    .unwrap();
}

#[tokio::test]
async fn terminates_after_consecutive_idle_rounds() {
  // The single window repeats forever; only dedup stops the loop.
  let cards = vec![card("alice")];
  let mut surface = FakeSurface::new(cards, vec![vec![0]]);

  let s = store().await;
  let run = s.begin_run("all").await.unwrap();

  let summary = Collector::new(fast_config())
    .collect(&mut surface, &s, run.id)
    .await
    .unwrap();

  assert_eq!(summary.recorded, 1);
  // One productive sweep, then idle_rounds empty ones.
  assert_eq!(summary.rounds, 4);
  assert_eq!(surface.reveals, 3);
  assert_eq!(summary.duplicates, 3);
}
