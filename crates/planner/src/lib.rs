//! # Router Planner
//!
//! Converts resolved intents into a staged execution DAG.
//!
//! ```text
//! PlanRequest
//!     ├─ cue edges:   "then" / "before" (forward), "after" (reverse) between consecutive mentions
//!     ├─ phase edges: shared resource + different phase, lower phase first
//!     ├─ toposort:    cycle -> sequential chain in request order
//!     └─ stages:      longest-path layering; blocking when a gated step is downstream
//! ```

mod builder;
mod cues;
mod error;

pub use builder::{PlanBuilder, PlanIntent, PlanRequest};
pub use cues::{has_force_cue, scan_cue, OrderCue};
pub use error::{PlanError, Result};
