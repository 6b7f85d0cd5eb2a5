//! Configuration loading — TOML file plus `PRICEWATCH_*` env overrides.
//!
//! Every value feeds an explicit constructor argument downstream
//! ([`CollectorConfig`], [`DropPolicy`], the store path); nothing here is
//! ambient state.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use pricewatch_analysis::DropPolicy;
use pricewatch_collector::{CollectorConfig, RetryPolicy};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
  pub db_path:           PathBuf,
  /// When set, the deals report also writes one free-account URL per line
  /// into this file.
  pub free_accounts_log: Option<PathBuf>,
  pub browser:           BrowserSection,
  pub collector:         CollectorSection,
  pub deals:             DealsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
  /// DevTools websocket of an already-running browser carrying the logged-in
  /// session. This tool never launches a browser of its own.
  pub ws_url:                 String,
  /// List page URL template; `{}` is replaced with the list id.
  pub list_url:               String,
  /// Profile URL template; `{}` is replaced with the entity handle.
  pub profile_url:            String,
  pub default_list_id:        String,
  pub page_load_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
  pub settle_timeout_secs: u64,
  pub idle_rounds:         u32,
  pub max_stale_retries:   u32,
  pub retry_backoff_ms:    u64,
  pub pace_ms:             u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DealsSection {
  pub window_days:        i64,
  pub drop_threshold_pct: f64,
  pub recency_runs:       usize,
}

impl Default for BrowserSection {
  fn default() -> Self {
    Self {
      ws_url:                 "ws://127.0.0.1:9222/devtools/browser".into(),
      list_url:               "https://onlyfans.com/my/collections/user-lists/{}".into(),
      profile_url:            "https://onlyfans.com/{}".into(),
      default_list_id:        "all".into(),
      page_load_timeout_secs: 20,
    }
  }
}

impl Default for CollectorSection {
  fn default() -> Self {
    Self {
      settle_timeout_secs: 20,
      idle_rounds:         3,
      max_stale_retries:   3,
      retry_backoff_ms:    250,
      pace_ms:             150,
    }
  }
}

impl Default for DealsSection {
  fn default() -> Self {
    Self {
      window_days:        30,
      drop_threshold_pct: 0.20,
      recency_runs:       2,
    }
  }
}

impl Config {
  pub fn db_path(&self) -> PathBuf {
    if self.db_path.as_os_str().is_empty() {
      PathBuf::from("data/pricewatch.db")
    } else {
      self.db_path.clone()
    }
  }
}

impl BrowserSection {
  pub fn list_url_for(&self, list_id: &str) -> String {
    self.list_url.replace("{}", list_id)
  }

  pub fn profile_url_for(&self, handle: &str) -> String {
    self.profile_url.replace("{}", handle)
  }

  pub fn page_load_timeout(&self) -> Duration {
    Duration::from_secs(self.page_load_timeout_secs)
  }
}

impl CollectorSection {
  pub fn collector_config(&self) -> CollectorConfig {
    CollectorConfig {
      settle_timeout: Duration::from_secs(self.settle_timeout_secs),
      idle_rounds:    self.idle_rounds,
      retry:          RetryPolicy {
        max_attempts: self.max_stale_retries,
        backoff:      Duration::from_millis(self.retry_backoff_ms),
      },
      pace:           Duration::from_millis(self.pace_ms),
    }
  }
}

impl DealsSection {
  pub fn drop_policy(&self) -> DropPolicy {
    DropPolicy {
      window_days:        self.window_days,
      drop_threshold_pct: self.drop_threshold_pct,
      recency_runs:       self.recency_runs,
    }
  }
}

/// Load configuration from `path` (optional) with env overrides.
pub fn load(path: &Path) -> anyhow::Result<Config> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path.to_path_buf()).required(false))
    .add_source(config::Environment::with_prefix("PRICEWATCH"))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise configuration")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_config_file_yields_defaults() {
    let cfg = load(Path::new("/nonexistent/pricewatch.toml")).unwrap();
    assert_eq!(cfg.db_path(), PathBuf::from("data/pricewatch.db"));
    assert_eq!(cfg.collector.idle_rounds, 3);
    assert_eq!(cfg.deals.window_days, 30);
  }

  #[test]
  fn url_templates_substitute() {
    let browser = BrowserSection::default();
    assert!(browser.list_url_for("123").ends_with("/user-lists/123"));
    assert!(browser.profile_url_for("alice").ends_with("/alice"));
  }

  #[test]
  fn sections_map_onto_component_configs() {
    let collector = CollectorSection::default().collector_config();
    assert_eq!(collector.idle_rounds, 3);
    assert_eq!(collector.retry.max_attempts, 3);
    assert_eq!(collector.pace, Duration::from_millis(150));

    let policy = DealsSection::default().drop_policy();
    assert_eq!(policy.window_days, 30);
    assert!((policy.drop_threshold_pct - 0.20).abs() < 1e-9);
  }
}
