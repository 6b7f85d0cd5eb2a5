//! The browsing capability consumed by the collector.
//!
//! Implementations wrap whatever drives the actual page (a DevTools
//! session, a fixture in tests). The collector depends only on this trait.

use std::{future::Future, time::Duration};

use pricewatch_extract::RawCard;
use thiserror::Error;

/// Failures surfaced by a [`ListSurface`].
#[derive(Debug, Error)]
pub enum SurfaceError {
  /// The element was re-rendered away between listing and reading.
  /// Expected under live virtualization; retried per element, then skipped.
  #[error("element is no longer attached")]
  Stale,

  /// A wait exceeded its upper bound without the page settling.
  #[error("timed out waiting for the surface to settle")]
  Timeout,

  /// The browsing capability is gone (tab closed, transport dropped).
  /// Aborts the run; records already written stay durable.
  #[error("browsing surface lost: {0}")]
  Gone(String),
}

impl SurfaceError {
  /// Transient failures are retried per element; anything else ends the run.
  pub fn is_transient(&self) -> bool { matches!(self, Self::Stale) }
}

/// Capability over one open, scrolled list view.
///
/// Methods take `&mut self`: a surface is one exclusive browsing session.
pub trait ListSurface: Send {
  /// Opaque reference to one currently-rendered element. Handles may go
  /// stale at any time; reads report that as [`SurfaceError::Stale`].
  type Handle: Clone + Send + Sync;

  /// Handles of the currently-visible elements, in render order.
  fn visible_cards(
    &mut self,
  ) -> impl Future<Output = Result<Vec<Self::Handle>, SurfaceError>> + Send + '_;

  /// Read one element's raw fields.
  fn read_card<'a>(
    &'a mut self,
    handle: &'a Self::Handle,
  ) -> impl Future<Output = Result<RawCard, SurfaceError>> + Send + 'a;

  /// Ask the page to extend the virtualized list (scroll).
  fn reveal_more(
    &mut self,
  ) -> impl Future<Output = Result<(), SurfaceError>> + Send + '_;

  /// Poll a content-readiness signal until the visible set changed or
  /// `timeout` elapsed. Returns whether a change was seen. Must suspend
  /// rather than spin.
  fn wait_until_settled(
    &mut self,
    timeout: Duration,
  ) -> impl Future<Output = Result<bool, SurfaceError>> + Send + '_;
}
