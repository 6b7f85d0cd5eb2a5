//! CSV export — one flat row per history point.

use std::{collections::HashMap, fs::File, io::Write as _, path::Path};

use anyhow::Context as _;
use pricewatch_core::history::HistoryPoint;

const HEADER: &str = "handle,price,status,tags,observed_at";

/// Write the full history to `path`. Tags are the entity's currently-open
/// set, joined with `;`; an unparsable price is an empty field.
pub fn write_csv(
  path: &Path,
  points: &[HistoryPoint],
  tags_by_handle: &HashMap<String, Vec<String>>,
) -> anyhow::Result<u64> {
  let mut file = File::create(path)
    .with_context(|| format!("creating export file {}", path.display()))?;

  writeln!(file, "{HEADER}")?;
  for point in points {
    let price = point
      .price
      .amount()
      .map(|v| v.to_string())
      .unwrap_or_default();
    let tags = tags_by_handle
      .get(&point.handle)
      .map(|t| t.join(";"))
      .unwrap_or_default();

    writeln!(
      file,
      "{},{},{},{},{}",
      field(&point.handle),
      price,
      point.status.as_str(),
      field(&tags),
      point.observed_at.to_rfc3339(),
    )?;
  }

  file.flush()?;
  Ok(points.len() as u64)
}

/// Minimal CSV quoting: only fields containing a delimiter, quote, or
/// newline get wrapped.
fn field(s: &str) -> String {
  if s.contains([',', '"', '\n']) {
    format!("\"{}\"", s.replace('"', "\"\""))
  } else {
    s.to_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_fields_pass_through() {
    assert_eq!(field("alice"), "alice");
    assert_eq!(field("free;paid"), "free;paid");
  }

  #[test]
  fn delimiters_and_quotes_are_escaped() {
    assert_eq!(field("a,b"), "\"a,b\"");
    assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
  }
}
