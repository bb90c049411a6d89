//! Local-first sync and analytics core for a two-person household finance
//! tracker.
//!
//! The crate mirrors a remote document store into reactive in-memory views
//! (`sync`), keeps a durable on-device fallback (`cache`), normalizes
//! documents written under older schema shapes (`normalize`), replays
//! pre-sync local data into the store exactly once (`migrate`), and derives
//! budget/goal forecasts and the spend-to-income status from the current
//! views (`projection`). The UI layer consumes `state::AppState` and stays
//! out of this crate.

pub mod achievements;
pub mod bundle;
pub mod cache;
pub mod error;
pub mod id;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod normalize;
pub mod projection;
pub mod remote;
pub mod state;
pub mod sync;
pub mod time;

pub use error::{AppError, AppResult};
pub use state::AppState;
