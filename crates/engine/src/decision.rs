use crate::disambiguate::{ResolutionKind, ResolvedAction};
use crate::scoring::{AppliedAdjustment, ScoredCandidate};
use crate::session::{SessionState, SuspendedSession};
use router_protocol::{ActionId, Clarification, ExecutionPlan, Urgency};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub action: ActionId,
    pub confidence: f32,
}

/// Why one chosen action scored what it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    pub action: ActionId,
    pub base_score: f32,
    pub adjustments: Vec<AppliedAdjustment>,
    pub feedback_delta: f32,
    pub confidence: f32,
}

impl From<&ScoredCandidate> for Rationale {
    fn from(candidate: &ScoredCandidate) -> Self {
        Self {
            action: candidate.action.clone(),
            base_score: candidate.base_score,
            adjustments: candidate.adjustments.clone(),
            feedback_delta: candidate.feedback_delta,
            confidence: candidate.confidence,
        }
    }
}

/// Outcome of a session that resolved. Deterministic for identical request, snapshot and
/// weights; the session id lives in the surrounding [`RouteResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub resolution: ResolutionKind,
    pub actions: Vec<ResolvedAction>,
    /// Remaining candidates, best first.
    pub alternatives: Vec<Alternative>,
    pub rationale: Vec<Rationale>,
    pub urgency: Urgency,
    pub threshold: f32,
    pub fingerprint: String,
}

impl RoutingDecision {
    pub fn primary(&self) -> Option<&ResolvedAction> {
        self.actions.first()
    }

    pub fn action_ids(&self) -> Vec<ActionId> {
        self.actions.iter().map(|a| a.action.clone()).collect()
    }
}

/// Exactly one of a routed plan or a clarification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteOutcome {
    Routed {
        decision: RoutingDecision,
        plan: ExecutionPlan,
    },
    Clarification {
        suspended: SuspendedSession,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Also the decision id used for feedback.
    pub session_id: String,
    pub state: SessionState,
    pub history: Vec<SessionState>,
    pub outcome: RouteOutcome,
}

impl RouteResponse {
    pub fn decision(&self) -> Option<&RoutingDecision> {
        match &self.outcome {
            RouteOutcome::Routed { decision, .. } => Some(decision),
            RouteOutcome::Clarification { .. } => None,
        }
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        match &self.outcome {
            RouteOutcome::Routed { plan, .. } => Some(plan),
            RouteOutcome::Clarification { .. } => None,
        }
    }

    pub fn clarification(&self) -> Option<&Clarification> {
        self.suspended().map(|s| &s.clarification)
    }

    pub fn suspended(&self) -> Option<&SuspendedSession> {
        match &self.outcome {
            RouteOutcome::Routed { .. } => None,
            RouteOutcome::Clarification { suspended } => Some(suspended),
        }
    }
}
