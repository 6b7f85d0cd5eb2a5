//! Price/status normalizer for subscribe-button wording.
//!
//! The button text is the only price signal the list view exposes. Known
//! shapes, in match order:
//!
//!   `SUBSCRIBED` / `RENEW ...`              → already paid for, price 0
//!   `SUBSCRIBE FREE for 7 days`             → free trial, price 0
//!   `SUBSCRIBE $3.74 for 31 days ...`       → discounted offer
//!   `SUBSCRIBE FOR FREE`                    → free, price 0
//!   `SUBSCRIBE $9.99 per month`             → regular price
//!
//! Anything else yields `(Unparsable, Unknown)` — never an error. The site
//! changes this markup without notice, and a degraded observation in the
//! history beats a missing one.

use pricewatch_core::entity::{Price, SubscriptionStatus};

/// The structured reading of one button text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
  pub price:  Price,
  pub status: SubscriptionStatus,
  /// The zero price came from limited-time trial wording.
  pub trial:  bool,
}

impl Normalized {
  /// The reading for text that matched nothing.
  pub fn degraded() -> Self {
    Self {
      price:  Price::Unparsable,
      status: SubscriptionStatus::Unknown,
      trial:  false,
    }
  }
}

/// Parse one raw button text into a structured reading. Total — unknown
/// shapes degrade instead of failing.
pub fn normalize(raw: &str) -> Normalized {
  let text = raw.trim();
  if text.is_empty() {
    return Normalized::degraded();
  }

  let tokens: Vec<&str> = text.split_whitespace().collect();

  let status = match tokens.first().copied() {
    Some("SUBSCRIBE") => SubscriptionStatus::NoSubscription,
    Some("SUBSCRIBED") => SubscriptionStatus::Subscribed,
    Some("RENEW") => SubscriptionStatus::Renewal,
    _ => SubscriptionStatus::Unknown,
  };

  // Offer classification, most specific wording first. `FREE for` must win
  // over the bare `days` check that marks a discounted offer.
  let (price, trial) = if text.contains("RENEW") || text.contains("SUBSCRIBED")
  {
    (Price::Amount(0.0), false)
  } else if text.contains("FREE for") {
    (Price::Amount(0.0), true)
  } else if text.contains("days") {
    // `SUBSCRIBE $3.74 for 31 days` — the amount sits fourth from the end.
    let amount = tokens
      .len()
      .checked_sub(4)
      .and_then(|i| tokens.get(i))
      .and_then(|t| parse_money(t));
    (amount.map_or(Price::Unparsable, Price::Amount), false)
  } else if text.contains("FOR FREE") {
    (Price::Amount(0.0), false)
  } else if text.contains("per month") {
    let amount = tokens.get(1).and_then(|t| parse_money(t));
    (amount.map_or(Price::Unparsable, Price::Amount), false)
  } else {
    (Price::Unparsable, false)
  };

  Normalized { price, status, trial }
}

/// Parse a money token (`$12.99`, `€1,299`, `5`). Returns `None` for tokens
/// without a non-negative numeric amount.
fn parse_money(token: &str) -> Option<f64> {
  if !token.chars().any(|c| c.is_ascii_digit()) {
    return None;
  }
  let cleaned: String = token
    .chars()
    .filter(|c| c.is_ascii_digit() || *c == '.')
    .collect();
  let amount: f64 = cleaned.parse().ok()?;
  (amount >= 0.0).then_some(amount)
}
