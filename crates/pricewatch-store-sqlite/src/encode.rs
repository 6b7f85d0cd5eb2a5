//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings normalised to UTC with microsecond
//! precision, so string comparison in SQL agrees with chronological order.
//! Prices are nullable REALs (NULL = unparsable). Statuses use the original
//! wire strings (`NO_SUBSCRIPTION`, `SUBSCRIBED`, ...).

use chrono::{DateTime, SecondsFormat, Utc};
use pricewatch_core::{
  entity::{Entity, Price, SubscriptionStatus},
  history::HistoryPoint,
  membership::ListMembership,
  run::{Run, RunStatus},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Price ───────────────────────────────────────────────────────────────────

pub fn encode_price(p: Price) -> Option<f64> { p.amount() }

pub fn decode_price(v: Option<f64>) -> Price {
  match v {
    Some(amount) => Price::Amount(amount),
    None => Price::Unparsable,
  }
}

// ─── SubscriptionStatus ──────────────────────────────────────────────────────

pub fn encode_status(s: SubscriptionStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<SubscriptionStatus> {
  SubscriptionStatus::parse(s)
    .ok_or_else(|| pricewatch_core::Error::UnknownStatus(s.to_owned()).into())
}

// ─── RunStatus ───────────────────────────────────────────────────────────────

pub fn encode_run_status(s: RunStatus) -> &'static str {
  match s {
    RunStatus::InProgress => "in_progress",
    RunStatus::Completed => "completed",
    RunStatus::Failed => "failed",
  }
}

pub fn decode_run_status(s: &str) -> Result<RunStatus> {
  match s {
    "in_progress" => Ok(RunStatus::InProgress),
    "completed" => Ok(RunStatus::Completed),
    "failed" => Ok(RunStatus::Failed),
    other => {
      Err(pricewatch_core::Error::UnknownRunStatus(other.to_owned()).into())
    }
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `runs` row.
pub struct RawRun {
  pub id:             i64,
  pub list_id:        String,
  pub started_at:     String,
  pub completed_at:   Option<String>,
  pub observed_count: i64,
  pub status:         String,
}

impl RawRun {
  pub fn into_run(self) -> Result<Run> {
    Ok(Run {
      id:             self.id,
      list_id:        self.list_id,
      started_at:     decode_dt(&self.started_at)?,
      completed_at:   self.completed_at.as_deref().map(decode_dt).transpose()?,
      observed_count: self.observed_count.max(0) as u64,
      status:         decode_run_status(&self.status)?,
    })
  }
}

/// Raw values read directly from an `entities` row.
pub struct RawEntity {
  pub handle:         String,
  pub display_name:   Option<String>,
  pub current_price:  Option<f64>,
  pub current_status: String,
  pub first_seen:     String,
  pub last_seen:      String,
  pub last_run_id:    Option<i64>,
}

impl RawEntity {
  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      handle:         self.handle,
      display_name:   self.display_name,
      current_price:  decode_price(self.current_price),
      current_status: decode_status(&self.current_status)?,
      first_seen:     decode_dt(&self.first_seen)?,
      last_seen:      decode_dt(&self.last_seen)?,
      last_run_id:    self.last_run_id,
    })
  }
}

/// Raw values read directly from a `history_points` row.
pub struct RawHistoryPoint {
  pub id:          i64,
  pub handle:      String,
  pub price:       Option<f64>,
  pub status:      String,
  pub observed_at: String,
  pub run_id:      i64,
}

impl RawHistoryPoint {
  pub fn into_point(self) -> Result<HistoryPoint> {
    Ok(HistoryPoint {
      id:          self.id,
      handle:      self.handle,
      price:       decode_price(self.price),
      status:      decode_status(&self.status)?,
      observed_at: decode_dt(&self.observed_at)?,
      run_id:      self.run_id,
    })
  }
}

/// Raw values read directly from a `list_memberships` row.
pub struct RawMembership {
  pub id:         i64,
  pub handle:     String,
  pub tag:        String,
  pub added_at:   String,
  pub removed_at: Option<String>,
  pub run_id:     i64,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<ListMembership> {
    Ok(ListMembership {
      id:         self.id,
      handle:     self.handle,
      tag:        self.tag,
      added_at:   decode_dt(&self.added_at)?,
      removed_at: self.removed_at.as_deref().map(decode_dt).transpose()?,
      run_id:     self.run_id,
    })
  }
}
