//! # Router Engine
//!
//! Orchestrates one routing session from free text to an execution plan or a clarification.
//!
//! ## Architecture
//!
//! ```text
//! RouteRequest
//!     │
//!     ├──> ContextCollector ──> ContextSnapshot (captured once, reused on resume)
//!     │
//!     ├──> PatternMatcher ──> MatchReport
//!     │
//!     ├──> ConfidenceScorer (deltas + learned weights, clamped to [0, 1])
//!     │
//!     ├──> Disambiguator
//!     │      ├─ explicit mention  -> resolved, confidence ignored
//!     │      ├─ compound request  -> one intent (or generic set) per family
//!     │      ├─ top >= threshold  -> resolved
//!     │      └─ otherwise         -> SuspendedSession (Ambiguous / NotUnderstood)
//!     │
//!     ├──> PlanBuilder ──> ExecutionPlan
//!     │
//!     └──> FeedbackStore (pending decision) + optional ExecutorAdapter
//! ```
//!
//! Sessions move through [`SessionState`]; every transition is checked.

mod config;
mod decision;
mod disambiguate;
mod dispatch;
mod error;
mod router;
mod scoring;
mod session;

pub use config::{RouterConfig, ScoringDeltas, Thresholds, CONFIG_ENV, RULES_ENV};
pub use decision::{Alternative, Rationale, RouteOutcome, RouteResponse, RoutingDecision};
pub use disambiguate::{Disambiguator, Resolution, ResolutionKind, ResolvedAction};
pub use dispatch::{outcome_state, ExecutorAdapter, StepReport, StepStatus};
pub use error::{EngineError, Result};
pub use router::Router;
pub use scoring::{Adjustment, AppliedAdjustment, ConfidenceScorer, ScoredCandidate};
pub use session::{SessionState, SessionTrace, SuspendedSession};
