//! Tunable parameters for deal detection.

/// Knobs for [`crate::Analyzer::recent_price_drops`]. The defaults mirror
/// what the signal was tuned against, but every value is policy, not
/// behaviour — callers pass their own.
#[derive(Debug, Clone, Copy)]
pub struct DropPolicy {
  /// Trailing window the baseline mean is computed over.
  pub window_days:        i64,
  /// Minimum relative drop against the baseline, as a fraction (0.2 = 20 %).
  pub drop_threshold_pct: f64,
  /// How many trailing observations the change must fall within for the
  /// drop to count as new rather than long-standing.
  pub recency_runs:       usize,
}

impl Default for DropPolicy {
  fn default() -> Self {
    Self {
      window_days:        30,
      drop_threshold_pct: 0.20,
      recency_runs:       2,
    }
  }
}
