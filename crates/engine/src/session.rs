use crate::error::{EngineError, Result};
use crate::scoring::ScoredCandidate;
use router_context::ContextSnapshot;
use router_protocol::{Clarification, RouteRequest};
use serde::{Deserialize, Serialize};

/// Lifecycle of one routing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    CollectingContext,
    Scoring,
    AutoResolved,
    AwaitingClarification,
    PlanBuilt,
    Dispatched,
    Completed,
    Failed,
    Partial,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed
                | SessionState::Failed
                | SessionState::Partial
                | SessionState::Cancelled
        )
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (CollectingContext, Scoring)
                | (Scoring, AutoResolved)
                | (Scoring, AwaitingClarification)
                | (AwaitingClarification, Scoring)
                | (AwaitingClarification, Cancelled)
                | (AutoResolved, PlanBuilt)
                | (PlanBuilt, Dispatched)
                | (PlanBuilt, Failed)
                | (Dispatched, Completed)
                | (Dispatched, Failed)
                | (Dispatched, Partial)
                | (Dispatched, Cancelled)
        )
    }
}

/// State plus the path that led to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTrace {
    pub session_id: String,
    pub state: SessionState,
    pub history: Vec<SessionState>,
}

impl SessionTrace {
    pub fn start(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: SessionState::CollectingContext,
            history: vec![SessionState::CollectingContext],
        }
    }

    /// Resume a suspended session at `AwaitingClarification`.
    pub fn suspended(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: SessionState::AwaitingClarification,
            history: vec![SessionState::AwaitingClarification],
        }
    }

    pub fn advance(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        log::debug!("session {}: {:?} -> {:?}", self.session_id, self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

/// Everything needed to pick a clarified session back up, possibly in another process.
///
/// The snapshot is reused on resume: context is captured once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendedSession {
    pub session_id: String,
    pub request: RouteRequest,
    pub snapshot: ContextSnapshot,
    pub candidates: Vec<ScoredCandidate>,
    pub clarification: Clarification,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut trace = SessionTrace::start("s1");
        for next in [
            SessionState::Scoring,
            SessionState::AutoResolved,
            SessionState::PlanBuilt,
            SessionState::Dispatched,
            SessionState::Completed,
        ] {
            trace.advance(next).unwrap();
        }
        assert!(trace.state.is_terminal());
        assert_eq!(trace.history.len(), 6);
    }

    #[test]
    fn clarification_can_loop_or_cancel() {
        let mut trace = SessionTrace::suspended("s2");
        trace.advance(SessionState::Scoring).unwrap();
        trace.advance(SessionState::AwaitingClarification).unwrap();
        trace.advance(SessionState::Cancelled).unwrap();
    }

    #[test]
    fn rejects_skipping_states() {
        let mut trace = SessionTrace::start("s3");
        assert!(matches!(
            trace.advance(SessionState::PlanBuilt),
            Err(EngineError::InvalidTransition { .. })
        ));
        assert_eq!(trace.state, SessionState::CollectingContext);
    }
}
