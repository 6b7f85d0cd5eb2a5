//! Entity types — the tracked subscription targets and their current-state
//! projection.
//!
//! An entity holds only the projection of its most recent observation. The
//! full record of what was seen lives in the append-only history
//! ([`crate::history::HistoryPoint`]).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::RunId;

// ─── Price ───────────────────────────────────────────────────────────────────

/// An observed subscription price.
///
/// Consumer-facing markup changes without notice, so a price that could not
/// be read is a first-class value rather than an error: a degraded
/// observation still belongs in the history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum Price {
  /// A parsed, non-negative amount in the site's display currency.
  Amount(f64),
  /// The raw text did not match any known price pattern.
  Unparsable,
}

impl Price {
  /// The parsed amount, if any.
  pub fn amount(&self) -> Option<f64> {
    match self {
      Self::Amount(v) => Some(*v),
      Self::Unparsable => None,
    }
  }

  pub fn is_parsable(&self) -> bool { matches!(self, Self::Amount(_)) }

  /// Exact-zero amounts only; `Unparsable` is not free.
  pub fn is_free(&self) -> bool { matches!(self, Self::Amount(v) if *v == 0.0) }
}

impl fmt::Display for Price {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Amount(v) => write!(f, "${v}"),
      Self::Unparsable => write!(f, "?"),
    }
  }
}

// ─── SubscriptionStatus ──────────────────────────────────────────────────────

/// The relationship between the observing account and an entity at the time
/// of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
  /// Not currently subscribed; the listing offers a subscribe action.
  NoSubscription,
  /// An active subscription exists.
  Subscribed,
  /// A lapsed subscription offered for renewal.
  Renewal,
  /// The listing text did not match any known wording.
  Unknown,
}

impl SubscriptionStatus {
  /// An open, paid-for relationship — either active or renewable.
  pub fn is_subscribed(&self) -> bool {
    matches!(self, Self::Subscribed | Self::Renewal)
  }

  /// The wire string stored in the database and emitted in exports.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::NoSubscription => "NO_SUBSCRIPTION",
      Self::Subscribed => "SUBSCRIBED",
      Self::Renewal => "RENEWAL",
      Self::Unknown => "UNKNOWN",
    }
  }

  /// Inverse of [`Self::as_str`].
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "NO_SUBSCRIPTION" => Some(Self::NoSubscription),
      "SUBSCRIBED" => Some(Self::Subscribed),
      "RENEWAL" => Some(Self::Renewal),
      "UNKNOWN" => Some(Self::Unknown),
      _ => None,
    }
  }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// One tracked subscription target, keyed by its immutable handle.
///
/// `current_price` and `current_status` always reflect the chronologically
/// latest observation; an out-of-order write appends history but never
/// regresses this projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
  pub handle:         String,
  /// Best-effort display name; updated whenever an observation carries one.
  pub display_name:   Option<String>,
  pub current_price:  Price,
  pub current_status: SubscriptionStatus,
  pub first_seen:     DateTime<Utc>,
  pub last_seen:      DateTime<Utc>,
  /// The run whose observation last advanced the projection.
  pub last_run_id:    Option<RunId>,
}

/// An entity bundled with its currently-open tag memberships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedEntity {
  pub entity: Entity,
  /// Open tags, sorted.
  pub tags:   Vec<String>,
}

impl TaggedEntity {
  pub fn has_tag(&self, tag: &str) -> bool {
    self.tags.iter().any(|t| t == tag)
  }
}
