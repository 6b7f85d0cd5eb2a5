//! Subcommand implementations.

use std::{collections::HashMap, io::Write as _, path::Path};

use anyhow::{Context as _, bail};
use pricewatch_analysis::Analyzer;
use pricewatch_collector::Collector;
use pricewatch_core::{
  run::RunOutcome,
  store::{RunScope, TrackerStore},
};
use pricewatch_store_sqlite::SqliteStore;
use tracing::{info, warn};

use crate::{config::Config, export, surface::CdpSurface};

/// How a command finished; `main` maps this onto process exit codes.
pub enum Exit {
  Ok,
  Interrupted,
}

fn rule() -> String { "=".repeat(60) }

async fn open_store(cfg: &Config) -> anyhow::Result<SqliteStore> {
  let path = cfg.db_path();
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating data directory {}", parent.display()))?;
  }

  SqliteStore::open(&path)
    .await
    .with_context(|| format!("opening store at {}", path.display()))
}

// ─── scrape ──────────────────────────────────────────────────────────────────

pub async fn scrape(
  cfg: &Config,
  list_id: Option<&str>,
  no_analyze: bool,
) -> anyhow::Result<Exit> {
  let list = list_id.unwrap_or(&cfg.browser.default_list_id);
  let store = open_store(cfg).await?;

  let list_url = cfg.browser.list_url_for(list);
  info!(list_id = list, url = %list_url, "attaching to browser");
  let mut surface = CdpSurface::attach(
    &cfg.browser.ws_url,
    &list_url,
    cfg.browser.page_load_timeout(),
  )
  .await?;

  let run = store.begin_run(list).await?;
  let collector = Collector::new(cfg.collector.collector_config());

  let summary = tokio::select! {
    result = collector.collect(&mut surface, &store, run.id) => result?,
    _ = tokio::signal::ctrl_c() => {
      // Finalize rather than leave a dangling in-progress run; everything
      // recorded so far is already durable.
      let captured =
        store.entities(RunScope::Run(run.id)).await?.len() as u64;
      store.end_run(run.id, RunOutcome::Failed, captured).await?;
      warn!(captured, "interrupted; run finalized as failed");
      return Ok(Exit::Interrupted);
    }
  };

  if let Some(cause) = &summary.aborted {
    store
      .end_run(run.id, RunOutcome::Failed, summary.recorded)
      .await?;
    if summary.recorded == 0 {
      bail!("collection aborted before any record was captured: {cause}");
    }
    // Partial success: the records are durable, so report the count
    // instead of failing the invocation.
    warn!(%cause, captured = summary.recorded, "browsing surface lost mid-run");
    println!(
      "Captured {} records before losing the browsing surface.",
      summary.recorded
    );
    return Ok(Exit::Ok);
  }

  store
    .end_run(run.id, RunOutcome::Completed, summary.recorded)
    .await?;
  println!(
    "Collected {} entities over {} sweeps ({} re-rendered duplicates, {} stale, {} dropped).",
    summary.recorded,
    summary.rounds,
    summary.duplicates,
    summary.stale_skipped,
    summary.missing_identifier,
  );

  if no_analyze {
    info!("skipping analysis (--no-analyze)");
  } else {
    print_deals(&store, cfg).await?;
  }

  Ok(Exit::Ok)
}

// ─── stats ───────────────────────────────────────────────────────────────────

pub async fn stats(cfg: &Config) -> anyhow::Result<Exit> {
  let store = open_store(cfg).await?;
  let stats = store.stats().await?;

  println!("{}", rule());
  println!("STORE STATISTICS");
  println!("{}", rule());
  println!("Entities:        {}", stats.entities);
  println!("Completed runs:  {}", stats.completed_runs);
  println!("History points:  {}", stats.history_points);
  println!(
    "Last run:        {}",
    stats
      .last_completed_at
      .map(|at| at.to_rfc3339())
      .unwrap_or_else(|| "never".into())
  );
  println!("{}", rule());

  Ok(Exit::Ok)
}

// ─── deals ───────────────────────────────────────────────────────────────────

pub async fn deals(cfg: &Config) -> anyhow::Result<Exit> {
  let store = open_store(cfg).await?;
  print_deals(&store, cfg).await?;
  Ok(Exit::Ok)
}

/// The combined deals report: free accounts and tagging issues scoped to the
/// most recent completed run, price signals over the full history.
async fn print_deals(store: &SqliteStore, cfg: &Config) -> anyhow::Result<()> {
  let analyzer = Analyzer::new(store);

  let scope = match store.latest_completed_run(None).await? {
    Some(run) => RunScope::Run(run.id),
    None => {
      println!("No completed runs yet — run `pricewatch scrape` first.");
      return Ok(());
    }
  };

  // Free and unclaimed — the primary target.
  let free = analyzer.free_not_subscribed(scope).await?;
  println!("{}", rule());
  println!("FREE ACCOUNTS NOT SUBSCRIBED TO ({})", free.len());
  println!("{}", rule());
  for account in &free {
    println!("  {}", cfg.browser.profile_url_for(&account.handle));
    if !account.tags.is_empty() {
      println!("    tags: {}", account.tags.join(", "));
    }
  }
  if let Some(path) = &cfg.free_accounts_log
    && !free.is_empty()
  {
    let mut file = std::fs::File::create(path)
      .with_context(|| format!("creating {}", path.display()))?;
    for account in &free {
      writeln!(file, "{}", cfg.browser.profile_url_for(&account.handle))?;
    }
    println!("Saved {} free accounts to {}", free.len(), path.display());
  }

  let issues = analyzer.categorization_issues(scope).await?;
  if !issues.is_empty() {
    println!("{}", rule());
    println!("CATEGORIZATION ISSUES ({})", issues.len());
    println!("{}", rule());
    for issue in issues.iter().take(15) {
      println!(
        "  {:?}: {} (price {}, tags: {})",
        issue.kind,
        cfg.browser.profile_url_for(&issue.handle),
        issue.price,
        issue.tags.join(", "),
      );
    }
    if issues.len() > 15 {
      println!("  ... and {} more", issues.len() - 15);
    }
  }

  let lows = analyzer.historical_lows(RunScope::AllHistory).await?;
  if !lows.is_empty() {
    println!("{}", rule());
    println!("HISTORICAL LOWS ({})", lows.len());
    println!("{}", rule());
    for low in lows.iter().take(20) {
      println!(
        "  {} at ${} (seen {} times)",
        cfg.browser.profile_url_for(&low.handle),
        low.price,
        low.times_seen,
      );
    }
    if lows.len() > 20 {
      println!("  ... and {} more", lows.len() - 20);
    }
  }

  let drops = analyzer
    .recent_price_drops(&cfg.deals.drop_policy())
    .await?;
  if !drops.is_empty() {
    println!("{}", rule());
    println!("FRESH PRICE DROPS ({})", drops.len());
    println!("{}", rule());
    for drop in &drops {
      println!(
        "  {} ${:.2} -> ${:.2} ({:.0}% off the trailing mean)",
        cfg.browser.profile_url_for(&drop.handle),
        drop.baseline,
        drop.current,
        drop.drop_pct * 100.0,
      );
    }
  }

  let trending = analyzer.trending_down(cfg.deals.window_days * 2).await?;
  if !trending.is_empty() {
    println!("{}", rule());
    println!("TRENDING CHEAPER ({})", trending.len());
    println!("{}", rule());
    for trend in trending.iter().take(20) {
      let [a, b, c] = trend.prices;
      println!(
        "  {} ${a} -> ${b} -> ${c}",
        cfg.browser.profile_url_for(&trend.handle),
      );
    }
  }

  Ok(())
}

// ─── history ─────────────────────────────────────────────────────────────────

pub async fn history(cfg: &Config, days: i64) -> anyhow::Result<Exit> {
  let store = open_store(cfg).await?;
  let changes = Analyzer::new(&store).price_changes(days).await?;

  println!("{}", rule());
  println!("PRICE CHANGES (last {days} days) — {}", changes.len());
  println!("{}", rule());
  for change in &changes {
    let arrow = if change.price < change.previous { "v" } else { "^" };
    println!(
      "  {arrow} {}: ${} -> ${} on {}",
      change.handle,
      change.previous,
      change.price,
      change.observed_at.format("%Y-%m-%d"),
    );
  }

  Ok(Exit::Ok)
}

// ─── user ────────────────────────────────────────────────────────────────────

pub async fn user(cfg: &Config, handle: &str) -> anyhow::Result<Exit> {
  let store = open_store(cfg).await?;

  let Some(entity) = store.entity(handle).await? else {
    println!("No history for @{handle}");
    return Ok(Exit::Ok);
  };

  let open_tags: Vec<String> = store
    .memberships(handle)
    .await?
    .into_iter()
    .filter(|m| m.is_open())
    .map(|m| m.tag)
    .collect();

  println!("{}", rule());
  println!(
    "@{} ({})",
    entity.handle,
    entity.display_name.as_deref().unwrap_or("no display name"),
  );
  println!("{}", rule());
  println!("Current price:   {}", entity.current_price);
  println!("Status:          {}", entity.current_status.as_str());
  println!("Tags:            {}", open_tags.join(", "));
  println!("First seen:      {}", entity.first_seen.format("%Y-%m-%d"));
  println!("Last seen:       {}", entity.last_seen.format("%Y-%m-%d"));
  println!();

  // Most recent first.
  let mut points = store.history(handle).await?;
  points.reverse();
  for point in points {
    println!(
      "  {}: {} ({})",
      point.observed_at.format("%Y-%m-%d %H:%M"),
      point.price,
      point.status.as_str(),
    );
  }

  Ok(Exit::Ok)
}

// ─── export ──────────────────────────────────────────────────────────────────

pub async fn export(cfg: &Config, file: &Path) -> anyhow::Result<Exit> {
  let store = open_store(cfg).await?;

  let points = store.history_since(None).await?;
  let tags_by_handle: HashMap<String, Vec<String>> = store
    .entities(RunScope::AllHistory)
    .await?
    .into_iter()
    .map(|t| (t.entity.handle, t.tags))
    .collect();

  let written = export::write_csv(file, &points, &tags_by_handle)?;
  println!("Exported {written} history points to {}", file.display());

  Ok(Exit::Ok)
}

// ─── config ──────────────────────────────────────────────────────────────────

pub async fn show_config(cfg: &Config, path: &Path) -> anyhow::Result<Exit> {
  println!("{}", rule());
  println!("CONFIGURATION ({})", path.display());
  println!("{}", rule());
  println!("Database:          {}", cfg.db_path().display());
  println!("Browser ws:        {}", cfg.browser.ws_url);
  println!("List URL:          {}", cfg.browser.list_url);
  println!("Default list:      {}", cfg.browser.default_list_id);
  println!(
    "Collector:         settle {}s, {} idle rounds, {} retries, pace {}ms",
    cfg.collector.settle_timeout_secs,
    cfg.collector.idle_rounds,
    cfg.collector.max_stale_retries,
    cfg.collector.pace_ms,
  );
  println!(
    "Deal policy:       {}d window, {:.0}% threshold, {} recency runs",
    cfg.deals.window_days,
    cfg.deals.drop_threshold_pct * 100.0,
    cfg.deals.recency_runs,
  );

  if cfg.db_path().exists() {
    println!("Database exists.");
  } else {
    println!("Database not created yet.");
  }

  Ok(Exit::Ok)
}
