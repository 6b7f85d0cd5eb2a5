//! DevTools-backed implementation of the collector's [`ListSurface`].
//!
//! Attaches to an already-running browser over its DevTools websocket — the
//! user's own session carries the login — and drives the list page with
//! small JS evaluations. Elements get a stable `data-pw-id` stamped on first
//! sight so a handle survives the virtualization re-rendering its node; a
//! handle whose node is gone reads back as `Stale`.

use std::time::Duration;

use anyhow::Context as _;
use chromiumoxide::{Browser, Page};
use futures::StreamExt as _;
use pricewatch_collector::{ListSurface, SurfaceError};
use pricewatch_extract::RawCard;
use serde::de::DeserializeOwned;
use tokio::time::{Instant, sleep};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Tags every visible card with a monotonically-assigned id and returns the
/// ids in render order.
const LIST_CARDS_JS: &str = "
(() => {
  const cards = document.querySelectorAll('div.b-users__item');
  if (window.__pw_next === undefined) { window.__pw_next = 0; }
  const ids = [];
  for (const el of cards) {
    if (!el.dataset.pwId) { el.dataset.pwId = String(window.__pw_next++); }
    ids.push(Number(el.dataset.pwId));
  }
  return ids;
})()";

/// Reads one tagged card; `null` when the node is no longer attached.
const READ_CARD_JS: &str = "
(() => {
  const el = document.querySelector('div.b-users__item[data-pw-id=\"__ID__\"]');
  if (!el) { return null; }
  const link = el.querySelector('a[href]');
  const username = el.querySelector('div.g-user-username');
  const name = el.querySelector('div.g-user-name');
  const button = el.querySelector('.b-wrap-btn-text');
  const chips = Array.from(el.querySelectorAll('span.b-list-titles__item__text'))
    .map((c) => c.textContent.trim());
  return {
    profile_href: link ? link.getAttribute('href') : null,
    username_text: username ? username.textContent.trim() : null,
    display_name: name ? name.textContent.trim() : null,
    action_text: button ? button.textContent.trim() : null,
    chip_labels: chips,
  };
})()";

const PAGE_STATE_JS: &str = "
[document.body.scrollHeight, document.querySelectorAll('div.b-users__item').length]";

const HAS_CARDS_JS: &str = "!!document.querySelector('div.b-users__item')";

const SCROLL_JS: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// One exclusive browsing session over one open list page.
pub struct CdpSurface {
  // Held so the websocket connection outlives the page.
  _browser:    Browser,
  page:        Page,
  last_height: i64,
  last_count:  u64,
}

impl CdpSurface {
  /// Attach to the browser behind `ws_url` and open `list_url`.
  ///
  /// Waits until the first card renders, bounded by `page_load_timeout`.
  pub async fn attach(
    ws_url: &str,
    list_url: &str,
    page_load_timeout: Duration,
  ) -> anyhow::Result<Self> {
    let (browser, mut handler) = Browser::connect(ws_url)
      .await
      .context("connecting to the browser's DevTools websocket")?;

    tokio::spawn(async move {
      while let Some(event) = handler.next().await {
        let _ = event;
      }
    });

    let page = browser
      .new_page(list_url)
      .await
      .context("opening the list page")?;

    let surface =
      Self { _browser: browser, page, last_height: 0, last_count: 0 };

    surface
      .wait_for_first_card(page_load_timeout)
      .await
      .context("waiting for the list to render")?;

    Ok(surface)
  }

  async fn wait_for_first_card(
    &self,
    timeout: Duration,
  ) -> anyhow::Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
      if self.eval::<bool>(HAS_CARDS_JS).await.unwrap_or(false) {
        return Ok(());
      }
      if Instant::now() >= deadline {
        anyhow::bail!("no list content within {timeout:?}");
      }
      sleep(POLL_INTERVAL).await;
    }
  }

  /// Evaluate a script and deserialize its JSON result.
  async fn eval<T: DeserializeOwned>(
    &self,
    script: &str,
  ) -> Result<T, SurfaceError> {
    let result = self
      .page
      .evaluate(script)
      .await
      .map_err(|e| SurfaceError::Gone(e.to_string()))?;

    result
      .into_value()
      .map_err(|e| SurfaceError::Gone(format!("unexpected result: {e}")))
  }

  /// Evaluate a script for its side effect only.
  async fn eval_unit(&self, script: &str) -> Result<(), SurfaceError> {
    self
      .page
      .evaluate(script)
      .await
      .map_err(|e| SurfaceError::Gone(e.to_string()))?;
    Ok(())
  }

  async fn page_state(&self) -> Result<(i64, u64), SurfaceError> {
    self.eval(PAGE_STATE_JS).await
  }
}

impl ListSurface for CdpSurface {
  type Handle = u64;

  async fn visible_cards(&mut self) -> Result<Vec<u64>, SurfaceError> {
    self.eval(LIST_CARDS_JS).await
  }

  async fn read_card(&mut self, handle: &u64) -> Result<RawCard, SurfaceError> {
    let script = READ_CARD_JS.replace("__ID__", &handle.to_string());
    let card: Option<RawCard> = self.eval(&script).await?;
    card.ok_or(SurfaceError::Stale)
  }

  async fn reveal_more(&mut self) -> Result<(), SurfaceError> {
    (self.last_height, self.last_count) = self.page_state().await?;
    self.eval_unit(SCROLL_JS).await
  }

  async fn wait_until_settled(
    &mut self,
    timeout: Duration,
  ) -> Result<bool, SurfaceError> {
    let deadline = Instant::now() + timeout;
    loop {
      let (height, count) = self.page_state().await?;
      if height != self.last_height || count != self.last_count {
        debug!(height, count, "list content changed");
        return Ok(true);
      }
      if Instant::now() >= deadline {
        return Ok(false);
      }
      sleep(POLL_INTERVAL).await;
    }
  }
}
