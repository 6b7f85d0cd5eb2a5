//! The [`Analyzer`] — derived signals computed from history and projections.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use pricewatch_core::{
  entity::SubscriptionStatus,
  history::HistoryPoint,
  store::{RunScope, TrackerStore},
};
use tracing::debug;

use crate::{
  policy::DropPolicy,
  report::{
    CategorizationIssue, FreeAccount, HistoricalLow, IssueKind, PriceChange,
    PriceDrop, TrendingDown,
  },
};

/// Tags whose presence the categorization check validates against.
const TAG_FREE: &str = "free";
const TAG_PAID: &str = "paid";
const TAG_ACTIVE_SUB: &str = "activesub";

/// Read-only query engine over any [`TrackerStore`].
pub struct Analyzer<'a, S> {
  store: &'a S,
}

impl<'a, S: TrackerStore> Analyzer<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Entities whose current price equals their all-time-low parsable price,
  /// with the number of observations at that price. Exact numeric equality,
  /// no tolerance band; unparsable current prices never qualify.
  pub async fn historical_lows(
    &self,
    scope: RunScope,
  ) -> Result<Vec<HistoricalLow>, S::Error> {
    let entities = self.store.entities(scope).await?;
    let by_handle = group_by_handle(self.store.history_since(None).await?);

    let mut lows = Vec::new();
    for tagged in entities {
      let Some(current) = tagged.entity.current_price.amount() else {
        continue;
      };
      let Some(points) = by_handle.get(&tagged.entity.handle) else {
        continue;
      };

      let min = points
        .iter()
        .filter_map(|p| p.price.amount())
        .fold(f64::INFINITY, f64::min);
      if min.is_infinite() || current != min {
        continue;
      }

      let times_seen = points
        .iter()
        .filter(|p| p.price.amount() == Some(min))
        .count() as u64;

      lows.push(HistoricalLow {
        handle: tagged.entity.handle,
        price: current,
        times_seen,
      });
    }

    lows.sort_by(|a, b| a.price.total_cmp(&b.price));
    Ok(lows)
  }

  /// Entities whose latest price recently fell below their trailing-window
  /// baseline. Long-standing lows never re-alert: the change must sit
  /// within the last `recency_runs` observations, and a price equal to the
  /// pre-window minimum is considered a stale deal.
  pub async fn recent_price_drops(
    &self,
    policy: &DropPolicy,
  ) -> Result<Vec<PriceDrop>, S::Error> {
    let now = Utc::now();
    let window_start = now - Duration::days(policy.window_days);
    let by_handle = group_by_handle(self.store.history_since(None).await?);

    let mut drops = Vec::new();
    for (handle, points) in by_handle {
      let Some(latest) = points.last() else { continue };
      let Some(current) = latest.price.amount() else { continue };

      // Baseline: parsable prices inside the window, latest excluded.
      let baseline_prices: Vec<f64> = points
        .iter()
        .take(points.len() - 1)
        .filter(|p| p.observed_at >= window_start)
        .filter_map(|p| p.price.amount())
        .collect();
      if baseline_prices.is_empty() {
        continue;
      }
      let baseline =
        baseline_prices.iter().sum::<f64>() / baseline_prices.len() as f64;
      if baseline <= 0.0 || current > baseline * (1.0 - policy.drop_threshold_pct)
      {
        continue;
      }

      // The drop must be new: the run of trailing observations already at
      // the current price has to fit within `recency_runs`.
      let trailing_same = points
        .iter()
        .rev()
        .take_while(|p| p.price == latest.price)
        .count();
      if trailing_same > policy.recency_runs || trailing_same == points.len() {
        continue;
      }

      // A price the entity already hit before the window is a stale deal.
      let pre_window_min = points
        .iter()
        .filter(|p| p.observed_at < window_start)
        .filter_map(|p| p.price.amount())
        .fold(f64::INFINITY, f64::min);
      if pre_window_min == current {
        continue;
      }

      debug!(%handle, current, baseline, "price drop detected");
      drops.push(PriceDrop {
        handle,
        current,
        baseline,
        drop_pct: (baseline - current) / baseline,
        observed_at: latest.observed_at,
      });
    }

    drops.sort_by(|a, b| b.drop_pct.total_cmp(&a.drop_pct));
    Ok(drops)
  }

  /// Every history point in the trailing window whose parsable price differs
  /// from the entity's immediately preceding parsable price, ordered by
  /// handle then time.
  pub async fn price_changes(
    &self,
    days: i64,
  ) -> Result<Vec<PriceChange>, S::Error> {
    let cutoff = Utc::now() - Duration::days(days);
    let by_handle = group_by_handle(self.store.history_since(None).await?);

    let mut changes = Vec::new();
    for (handle, points) in by_handle {
      for pair in points.windows(2) {
        let (Some(previous), Some(price)) =
          (pair[0].price.amount(), pair[1].price.amount())
        else {
          continue;
        };
        if previous != price && pair[1].observed_at >= cutoff {
          changes.push(PriceChange {
            handle: handle.clone(),
            previous,
            price,
            observed_at: pair[1].observed_at,
          });
        }
      }
    }

    Ok(changes)
  }

  /// Entities whose observed price/status implies a tag their open
  /// membership set does not carry, plus lapsed subscriptions still tagged
  /// as active.
  pub async fn categorization_issues(
    &self,
    scope: RunScope,
  ) -> Result<Vec<CategorizationIssue>, S::Error> {
    let entities = self.store.entities(scope).await?;

    let mut issues = Vec::new();
    for tagged in entities {
      let price = tagged.entity.current_price;
      let status = tagged.entity.current_status;

      if price.is_free() && !tagged.has_tag(TAG_FREE) {
        issues.push(CategorizationIssue {
          handle: tagged.entity.handle.clone(),
          kind:   IssueKind::NotTaggedFree,
          price,
          tags:   tagged.tags.clone(),
        });
      }

      if price.amount().is_some_and(|v| v > 0.0)
        && status.is_subscribed()
        && !tagged.has_tag(TAG_PAID)
      {
        issues.push(CategorizationIssue {
          handle: tagged.entity.handle.clone(),
          kind:   IssueKind::NotTaggedPaid,
          price,
          tags:   tagged.tags.clone(),
        });
      }

      if status == SubscriptionStatus::NoSubscription
        && tagged.has_tag(TAG_ACTIVE_SUB)
      {
        issues.push(CategorizationIssue {
          handle: tagged.entity.handle.clone(),
          kind:   IssueKind::LapsedActiveSub,
          price,
          tags:   tagged.tags.clone(),
        });
      }
    }

    Ok(issues)
  }

  /// Entities reachable at zero cost and not yet subscribed to.
  pub async fn free_not_subscribed(
    &self,
    scope: RunScope,
  ) -> Result<Vec<FreeAccount>, S::Error> {
    let entities = self.store.entities(scope).await?;

    Ok(
      entities
        .into_iter()
        .filter(|t| {
          t.entity.current_price.is_free()
            && t.entity.current_status == SubscriptionStatus::NoSubscription
        })
        .map(|t| FreeAccount {
          handle:       t.entity.handle,
          display_name: t.entity.display_name,
          tags:         t.tags,
        })
        .collect(),
    )
  }

  /// Entities whose last three parsable prices within the window fell
  /// strictly, ordered by total drop.
  pub async fn trending_down(
    &self,
    days: i64,
  ) -> Result<Vec<TrendingDown>, S::Error> {
    let cutoff = Utc::now() - Duration::days(days);
    let by_handle =
      group_by_handle(self.store.history_since(Some(cutoff)).await?);

    let mut trends = Vec::new();
    for (handle, points) in by_handle {
      let prices: Vec<f64> =
        points.iter().filter_map(|p| p.price.amount()).collect();
      if prices.len() < 3 {
        continue;
      }
      let tail = &prices[prices.len() - 3..];
      if tail[0] > tail[1] && tail[1] > tail[2] {
        trends.push(TrendingDown {
          handle,
          prices: [tail[0], tail[1], tail[2]],
          total_drop: tail[0] - tail[2],
        });
      }
    }

    trends.sort_by(|a, b| b.total_drop.total_cmp(&a.total_drop));
    Ok(trends)
  }
}

/// Group history points (already ordered by handle then time) per handle,
/// preserving chronological order.
fn group_by_handle(
  points: Vec<HistoryPoint>,
) -> BTreeMap<String, Vec<HistoryPoint>> {
  let mut map: BTreeMap<String, Vec<HistoryPoint>> = BTreeMap::new();
  for point in points {
    map.entry(point.handle.clone()).or_default().push(point);
  }
  map
}
