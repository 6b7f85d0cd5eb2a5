//! The raw-element projection handed to the extractor.

use serde::{Deserialize, Serialize};

/// Plain-text fields read off one visible list element.
///
/// The browsing adapter produces these; every field is best-effort because
/// the surrounding markup is not under our control. Serde derives let an
/// adapter deserialize a card straight from an in-page JSON read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCard {
  /// `href` of the profile link, absolute or path-relative.
  pub profile_href:  Option<String>,
  /// Visible username text, usually prefixed with `@`.
  pub username_text: Option<String>,
  pub display_name:  Option<String>,
  /// Text of the subscribe-button-like element.
  pub action_text:   Option<String>,
  /// Labels of the tag chips attached to the element.
  pub chip_labels:   Vec<String>,
}
