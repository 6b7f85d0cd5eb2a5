//! Time-bounded tag membership.
//!
//! Membership rows are never deleted. A tag observed on an entity opens a
//! row; the tag disappearing on a later observation closes it by setting
//! `removed_at`. Reappearance opens a fresh row, so the full membership
//! history stays reconstructable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::RunId;

/// One open-or-closed association between an entity and a tag.
///
/// Invariant: at most one open row (`removed_at` = `None`) exists per
/// `(handle, tag)` pair at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMembership {
  pub id:         i64,
  pub handle:     String,
  pub tag:        String,
  pub added_at:   DateTime<Utc>,
  pub removed_at: Option<DateTime<Utc>>,
  /// The run that opened this row.
  pub run_id:     RunId,
}

impl ListMembership {
  pub fn is_open(&self) -> bool { self.removed_at.is_none() }
}
