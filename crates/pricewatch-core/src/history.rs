//! Observations and history points — the fundamental units of the tracker.
//!
//! An [`Observation`] is what the collector extracts from one visible list
//! element. A [`HistoryPoint`] is the persisted form: immutable, append-only,
//! never updated or deleted. The full time series is the source of truth;
//! every projection is derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{Price, SubscriptionStatus},
  run::RunId,
};

// ─── Observation ─────────────────────────────────────────────────────────────

/// One normalized reading of a visible list element.
///
/// `observed_at` is assigned at extraction time and carried by the value, so
/// that an at-least-once redelivery of the same observation deduplicates on
/// `(handle, observed_at)` instead of producing a second history point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
  pub handle:       String,
  pub display_name: Option<String>,
  pub price:        Price,
  pub status:       SubscriptionStatus,
  /// The zero price came from limited-time trial wording.
  pub trial:        bool,
  /// Tag chips visible on the element, deduplicated and sorted.
  pub tags:         Vec<String>,
  pub observed_at:  DateTime<Utc>,
}

impl Observation {
  /// Convenience constructor with all optional fields at their defaults and
  /// `observed_at` set to now.
  pub fn new(
    handle: impl Into<String>,
    price: Price,
    status: SubscriptionStatus,
  ) -> Self {
    Self {
      handle: handle.into(),
      display_name: None,
      price,
      status,
      trial: false,
      tags: Vec::new(),
      observed_at: Utc::now(),
    }
  }
}

// ─── HistoryPoint ────────────────────────────────────────────────────────────

/// One immutable price/status observation as persisted. Once written, no
/// field is ever updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
  pub id:          i64,
  pub handle:      String,
  pub price:       Price,
  pub status:      SubscriptionStatus,
  pub observed_at: DateTime<Utc>,
  /// The run this observation was collected under.
  pub run_id:      RunId,
}
