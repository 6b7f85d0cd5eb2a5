//! Analysis tests against an in-memory store.

use chrono::{DateTime, Duration, Utc};
use pricewatch_core::{
  entity::{Price, SubscriptionStatus},
  history::Observation,
  run::RunOutcome,
  store::{RunScope, TrackerStore},
};
use pricewatch_store_sqlite::SqliteStore;

use crate::{Analyzer, DropPolicy, IssueKind};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.expect("in-memory store")
}

fn days_ago(n: i64) -> DateTime<Utc> { Utc::now() - Duration::days(n) }

fn obs(handle: &str, price: Price, at: DateTime<Utc>) -> Observation {
  Observation {
    handle:       handle.into(),
    display_name: None,
    price,
    status:       SubscriptionStatus::NoSubscription,
    trial:        false,
    tags:         Vec::new(),
    observed_at:  at,
  }
}

/// Record a sequence of (price, days-ago) observations under one run.
async fn seed(s: &SqliteStore, handle: &str, series: &[(f64, i64)]) {
  let run = s.begin_run("all").await.unwrap();
  for (price, ago) in series {
    s.record(run.id, obs(handle, Price::Amount(*price), days_ago(*ago)))
      .await
      .unwrap();
  }
  s.end_run(run.id, RunOutcome::Completed, series.len() as u64)
    .await
    .unwrap();
}

// ─── Empty-store totality ────────────────────────────────────────────────────

#[tokio::test]
async fn every_query_is_empty_on_an_empty_store() {
  let s = store().await;
  let a = Analyzer::new(&s);

  assert!(a.historical_lows(RunScope::AllHistory).await.unwrap().is_empty());
  assert!(
    a.recent_price_drops(&DropPolicy::default())
      .await
      .unwrap()
      .is_empty()
  );
  assert!(a.price_changes(30).await.unwrap().is_empty());
  assert!(
    a.categorization_issues(RunScope::AllHistory)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    a.free_not_subscribed(RunScope::AllHistory)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(a.trending_down(60).await.unwrap().is_empty());
}

// ─── Historical lows ─────────────────────────────────────────────────────────

#[tokio::test]
async fn alice_is_a_historical_low_seen_once() {
  let s = store().await;
  seed(&s, "alice", &[(12.99, 19), (12.99, 10), (6.99, 0)]).await;

  let lows = Analyzer::new(&s)
    .historical_lows(RunScope::AllHistory)
    .await
    .unwrap();

  assert_eq!(lows.len(), 1);
  assert_eq!(lows[0].handle, "alice");
  assert_eq!(lows[0].price, 6.99);
  assert_eq!(lows[0].times_seen, 1);
}

#[tokio::test]
async fn entity_above_its_low_is_not_reported() {
  let s = store().await;
  seed(&s, "gary", &[(6.99, 10), (12.99, 0)]).await;

  let lows = Analyzer::new(&s)
    .historical_lows(RunScope::AllHistory)
    .await
    .unwrap();
  assert!(lows.is_empty());
}

#[tokio::test]
async fn unparsable_current_price_never_qualifies_as_low() {
  let s = store().await;
  let run = s.begin_run("all").await.unwrap();
  s.record(run.id, obs("alice", Price::Amount(5.0), days_ago(10)))
    .await
    .unwrap();
  s.record(run.id, obs("alice", Price::Unparsable, days_ago(0)))
    .await
    .unwrap();
  s.end_run(run.id, RunOutcome::Completed, 2).await.unwrap();

  let lows = Analyzer::new(&s)
    .historical_lows(RunScope::AllHistory)
    .await
    .unwrap();
  assert!(lows.is_empty());
}

#[tokio::test]
async fn times_seen_counts_every_observation_at_the_low() {
  let s = store().await;
  seed(&s, "bob", &[(5.0, 20), (5.0, 10), (5.0, 0)]).await;

  let lows = Analyzer::new(&s)
    .historical_lows(RunScope::AllHistory)
    .await
    .unwrap();
  assert_eq!(lows.len(), 1);
  assert_eq!(lows[0].times_seen, 3);
}

// ─── Recent price drops ──────────────────────────────────────────────────────

#[tokio::test]
async fn alice_drop_exceeds_twenty_percent() {
  let s = store().await;
  seed(&s, "alice", &[(12.99, 19), (12.99, 10), (6.99, 0)]).await;

  let policy = DropPolicy {
    window_days: 30,
    drop_threshold_pct: 0.2,
    recency_runs: 2,
  };
  let drops = Analyzer::new(&s).recent_price_drops(&policy).await.unwrap();

  assert_eq!(drops.len(), 1);
  let drop = &drops[0];
  assert_eq!(drop.handle, "alice");
  assert_eq!(drop.current, 6.99);
  assert!((drop.baseline - 12.99).abs() < 1e-9);
  assert!(drop.drop_pct > 0.2);
}

#[tokio::test]
async fn bob_flat_price_never_alerts() {
  let s = store().await;
  let series: Vec<(f64, i64)> = (0..60).map(|d| (5.0, d)).collect();
  seed(&s, "bob", &series).await;

  let drops = Analyzer::new(&s)
    .recent_price_drops(&DropPolicy::default())
    .await
    .unwrap();
  assert!(drops.is_empty());
}

#[tokio::test]
async fn long_standing_discount_does_not_realert() {
  let s = store().await;
  // Dropped to 6.99 ten days ago and stayed there for four observations:
  // the change no longer sits within the last two runs.
  seed(
    &s,
    "carol",
    &[(12.99, 25), (6.99, 10), (6.99, 7), (6.99, 4), (6.99, 0)],
  )
  .await;

  let drops = Analyzer::new(&s)
    .recent_price_drops(&DropPolicy::default())
    .await
    .unwrap();
  assert!(drops.is_empty());
}

#[tokio::test]
async fn price_equal_to_pre_window_low_is_a_stale_deal() {
  let s = store().await;
  // dave already hit 5.00 before the window; returning to it is not news.
  seed(
    &s,
    "dave",
    &[(10.0, 40), (5.0, 35), (10.0, 20), (10.0, 10), (5.0, 0)],
  )
  .await;

  let drops = Analyzer::new(&s)
    .recent_price_drops(&DropPolicy::default())
    .await
    .unwrap();
  assert!(drops.is_empty());
}

#[tokio::test]
async fn single_observation_has_no_baseline() {
  let s = store().await;
  seed(&s, "erin", &[(3.0, 0)]).await;

  let drops = Analyzer::new(&s)
    .recent_price_drops(&DropPolicy::default())
    .await
    .unwrap();
  assert!(drops.is_empty());
}

// ─── Price changes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn price_changes_report_transitions_within_window() {
  let s = store().await;
  seed(&s, "alice", &[(12.99, 40), (9.99, 20), (9.99, 10), (6.99, 0)]).await;

  let changes = Analyzer::new(&s).price_changes(30).await.unwrap();

  // 12.99→9.99 happened inside the window; the flat 9.99→9.99 is not a
  // change; 9.99→6.99 is.
  assert_eq!(changes.len(), 2);
  assert_eq!(changes[0].previous, 12.99);
  assert_eq!(changes[0].price, 9.99);
  assert_eq!(changes[1].previous, 9.99);
  assert_eq!(changes[1].price, 6.99);
}

#[tokio::test]
async fn price_changes_are_ordered_by_handle_then_time() {
  let s = store().await;
  seed(&s, "zed", &[(10.0, 5), (8.0, 1)]).await;
  seed(&s, "amy", &[(4.0, 4), (2.0, 2)]).await;

  let changes = Analyzer::new(&s).price_changes(30).await.unwrap();
  let handles: Vec<&str> =
    changes.iter().map(|c| c.handle.as_str()).collect();
  assert_eq!(handles, vec!["amy", "zed"]);
}

// ─── Categorization issues ───────────────────────────────────────────────────

#[tokio::test]
async fn flags_untagged_free_and_paid_and_lapsed() {
  let s = store().await;
  let run = s.begin_run("all").await.unwrap();

  // Free but not tagged free.
  s.record(run.id, obs("freya", Price::Amount(0.0), days_ago(0)))
    .await
    .unwrap();

  // Paid + subscribed but not tagged paid.
  let mut paid = obs("petra", Price::Amount(9.99), days_ago(0));
  paid.status = SubscriptionStatus::Subscribed;
  s.record(run.id, paid).await.unwrap();

  // Lapsed: no subscription yet still tagged activesub.
  let mut lapsed = obs("lena", Price::Amount(9.99), days_ago(0));
  lapsed.tags = vec!["activesub".into(), "paid".into()];
  s.record(run.id, lapsed).await.unwrap();

  s.end_run(run.id, RunOutcome::Completed, 3).await.unwrap();

  let issues = Analyzer::new(&s)
    .categorization_issues(RunScope::AllHistory)
    .await
    .unwrap();

  let kinds: Vec<(&str, IssueKind)> = issues
    .iter()
    .map(|i| (i.handle.as_str(), i.kind))
    .collect();
  assert!(kinds.contains(&("freya", IssueKind::NotTaggedFree)));
  assert!(kinds.contains(&("petra", IssueKind::NotTaggedPaid)));
  assert!(kinds.contains(&("lena", IssueKind::LapsedActiveSub)));
  assert_eq!(issues.len(), 3);
}

#[tokio::test]
async fn correctly_tagged_entities_raise_no_issues() {
  let s = store().await;
  let run = s.begin_run("all").await.unwrap();

  let mut free = obs("freya", Price::Amount(0.0), days_ago(0));
  free.tags = vec!["free".into()];
  s.record(run.id, free).await.unwrap();

  let mut paid = obs("petra", Price::Amount(9.99), days_ago(0));
  paid.status = SubscriptionStatus::Subscribed;
  paid.tags = vec!["activesub".into(), "paid".into()];
  s.record(run.id, paid).await.unwrap();

  s.end_run(run.id, RunOutcome::Completed, 2).await.unwrap();

  let issues = Analyzer::new(&s)
    .categorization_issues(RunScope::AllHistory)
    .await
    .unwrap();
  assert!(issues.is_empty());
}

// ─── Free accounts ───────────────────────────────────────────────────────────

#[tokio::test]
async fn free_not_subscribed_filters_status_and_price() {
  let s = store().await;
  let run = s.begin_run("all").await.unwrap();

  s.record(run.id, obs("freya", Price::Amount(0.0), days_ago(0)))
    .await
    .unwrap();

  let mut subscribed = obs("sam", Price::Amount(0.0), days_ago(0));
  subscribed.status = SubscriptionStatus::Subscribed;
  s.record(run.id, subscribed).await.unwrap();

  s.record(run.id, obs("petra", Price::Amount(9.99), days_ago(0)))
    .await
    .unwrap();

  s.end_run(run.id, RunOutcome::Completed, 3).await.unwrap();

  let free = Analyzer::new(&s)
    .free_not_subscribed(RunScope::AllHistory)
    .await
    .unwrap();

  assert_eq!(free.len(), 1);
  assert_eq!(free[0].handle, "freya");
}

#[tokio::test]
async fn run_scope_restricts_to_entities_seen_in_that_run() {
  let s = store().await;

  let run1 = s.begin_run("all").await.unwrap();
  s.record(run1.id, obs("old", Price::Amount(0.0), days_ago(10)))
    .await
    .unwrap();
  s.end_run(run1.id, RunOutcome::Completed, 1).await.unwrap();

  let run2 = s.begin_run("all").await.unwrap();
  s.record(run2.id, obs("fresh", Price::Amount(0.0), days_ago(0)))
    .await
    .unwrap();
  s.end_run(run2.id, RunOutcome::Completed, 1).await.unwrap();

  let scoped = Analyzer::new(&s)
    .free_not_subscribed(RunScope::Run(run2.id))
    .await
    .unwrap();
  assert_eq!(scoped.len(), 1);
  assert_eq!(scoped[0].handle, "fresh");

  let all = Analyzer::new(&s)
    .free_not_subscribed(RunScope::AllHistory)
    .await
    .unwrap();
  assert_eq!(all.len(), 2);
}

// ─── Trending down ───────────────────────────────────────────────────────────

#[tokio::test]
async fn strictly_decreasing_tail_is_trending() {
  let s = store().await;
  seed(&s, "tina", &[(15.0, 20), (10.0, 10), (7.5, 0)]).await;
  seed(&s, "flat", &[(5.0, 20), (5.0, 10), (5.0, 0)]).await;

  let trends = Analyzer::new(&s).trending_down(60).await.unwrap();
  assert_eq!(trends.len(), 1);
  assert_eq!(trends[0].handle, "tina");
  assert_eq!(trends[0].prices, [15.0, 10.0, 7.5]);
  assert!((trends[0].total_drop - 7.5).abs() < 1e-9);
}
