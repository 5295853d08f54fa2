//! # Router Context
//!
//! Repository signals consumed by the confidence scorer.
//!
//! ```text
//! ContextCollector (trait)
//!     ├─ WorkspaceCollector: git status, file walk, diagnostics report
//!     └─ StaticCollector:    fixed values (tests, --context files)
//!
//! capture_snapshot
//!     ├─ tokio::join! over the three probes, each under its own timeout
//!     ├─ failures and timeouts -> Probe::Unavailable
//!     └─ urgency: explicit override, else phrasing
//! ```

mod collector;
mod error;
mod snapshot;
mod static_collector;
mod urgency;
mod workspace;

pub use collector::{capture_snapshot, ContextCollector, DEFAULT_PROBE_TIMEOUT};
pub use error::{ContextError, Result};
pub use snapshot::{
    ContextSnapshot, ContextSource, DiagnosticCounts, FileTypeMix, GitState, Probe,
    FILE_TYPE_SHARE,
};
pub use static_collector::StaticCollector;
pub use urgency::{detect_urgency, resolve_urgency};
pub use workspace::{parse_porcelain, WorkspaceCollector};
