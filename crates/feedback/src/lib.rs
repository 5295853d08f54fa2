//! # Router Feedback
//!
//! Learns per-context preferences from routing outcomes.
//!
//! Decisions are registered when routed and stay pending for the correction window. Explicit
//! feedback (accepted, corrected, failed) or the window elapsing turns them into records in an
//! append-only log. Weights are never edited in place: each write replays the log into a new
//! [`WeightSnapshot`], bounded at `±cap` per (action, context fingerprint).

mod error;
mod record;
mod store;
mod weights;

pub use error::{FeedbackError, Result};
pub use record::{FeedbackRecord, PendingDecision, RecordOutcome};
pub use store::FeedbackStore;
pub use weights::{recompute, FeedbackPolicy, WeightEntry, WeightSnapshot};
