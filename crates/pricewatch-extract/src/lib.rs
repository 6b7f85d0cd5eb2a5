//! Extraction of normalized observations from raw list elements.
//!
//! Pipeline:
//!   RawCard (plain-text projection of one visible element)
//!     └─ extract()          → Observation
//!          └─ normalize()   → (Price, SubscriptionStatus, trial flag)
//!
//! Extraction is total over everything except a missing identifier: a row
//! whose price text cannot be read becomes a degraded observation, never an
//! error, because losing the row entirely is worse.

pub mod card;
pub mod error;
pub mod extract;
pub mod normalize;

pub use card::RawCard;
pub use error::{Error, Result};
pub use extract::extract;
pub use normalize::{Normalized, normalize};
