//! Entity extraction — one [`RawCard`] in, one [`Observation`] out.

use chrono::Utc;
use pricewatch_core::history::Observation;
use tracing::debug;

use crate::{
  card::RawCard,
  error::{Error, Result},
  normalize::{Normalized, normalize},
};

/// The chip the list header renders before the real tags.
const CHIP_HEADER: &str = "Lists";

/// Extract a normalized observation from one raw element.
///
/// The only failure is a missing identifier; everything else degrades
/// field-by-field. The caller treats a failure as skip-and-continue, never
/// as a batch abort.
pub fn extract(card: &RawCard) -> Result<Observation> {
  let handle = identifier(card).ok_or(Error::MissingIdentifier)?;

  let Normalized { price, status, trial } = card
    .action_text
    .as_deref()
    .map(normalize)
    .unwrap_or_else(Normalized::degraded);

  let display_name = card
    .display_name
    .as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned);

  let mut tags: Vec<String> = card
    .chip_labels
    .iter()
    .map(|l| l.trim())
    .filter(|l| !l.is_empty() && *l != CHIP_HEADER)
    .map(str::to_owned)
    .collect();
  tags.sort();
  tags.dedup();

  debug!(%handle, %price, ?status, "extracted observation");

  Ok(Observation {
    handle,
    display_name,
    price,
    status,
    trial,
    tags,
    observed_at: Utc::now(),
  })
}

/// Resolve the stable identifier: profile-link path segment first, visible
/// username text (leading `@` trimmed) as fallback.
fn identifier(card: &RawCard) -> Option<String> {
  if let Some(href) = card.profile_href.as_deref() {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    // Cut any scheme and authority so a bare origin yields no segment.
    let path = match path.find("://") {
      Some(idx) => path[idx + 3..]
        .split_once('/')
        .map(|(_, rest)| rest)
        .unwrap_or(""),
      None => path,
    };
    let segment = path.trim_matches('/').rsplit('/').next().unwrap_or("");
    if !segment.is_empty() {
      return Some(segment.to_owned());
    }
  }

  card
    .username_text
    .as_deref()
    .map(|t| t.trim().trim_start_matches('@'))
    .filter(|t| !t.is_empty())
    .map(str::to_owned)
}
