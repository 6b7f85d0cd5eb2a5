//! Result row types for the analysis queries.
//!
//! Fixed structured records — a field per column, no dynamic attribute
//! access anywhere downstream.

use chrono::{DateTime, Utc};
use serde::Serialize;
use pricewatch_core::entity::Price;

/// An entity currently sitting at its all-time-low parsable price.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalLow {
  pub handle:     String,
  pub price:      f64,
  /// How many observations ever saw this exact price.
  pub times_seen: u64,
}

/// An entity whose current price recently fell below its trailing baseline.
#[derive(Debug, Clone, Serialize)]
pub struct PriceDrop {
  pub handle:      String,
  pub current:     f64,
  /// Trailing-window mean, excluding the latest observation.
  pub baseline:    f64,
  /// Relative drop against the baseline, as a fraction.
  pub drop_pct:    f64,
  pub observed_at: DateTime<Utc>,
}

/// One point whose price differs from the entity's immediately preceding
/// point.
#[derive(Debug, Clone, Serialize)]
pub struct PriceChange {
  pub handle:      String,
  pub previous:    f64,
  pub price:       f64,
  pub observed_at: DateTime<Utc>,
}

/// Why an entity's tag set disagrees with its observed price/status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
  /// Price is zero but the entity carries no `free` tag.
  NotTaggedFree,
  /// Paid and subscribed, but no `paid` tag.
  NotTaggedPaid,
  /// Still tagged `activesub` while no subscription is open.
  LapsedActiveSub,
}

/// An entity whose tags disagree with its observed price/status.
#[derive(Debug, Clone, Serialize)]
pub struct CategorizationIssue {
  pub handle: String,
  pub kind:   IssueKind,
  pub price:  Price,
  /// The entity's currently-open tags, for context.
  pub tags:   Vec<String>,
}

/// An entity reachable at zero cost but not yet subscribed to.
#[derive(Debug, Clone, Serialize)]
pub struct FreeAccount {
  pub handle:       String,
  pub display_name: Option<String>,
  pub tags:         Vec<String>,
}

/// An entity whose last three prices within the window fell monotonically.
#[derive(Debug, Clone, Serialize)]
pub struct TrendingDown {
  pub handle: String,
  /// Oldest to newest of the three trailing prices.
  pub prices: [f64; 3],
  /// `prices[0] - prices[2]`.
  pub total_drop: f64,
}
