use crate::session::SessionState;
use async_trait::async_trait;
use router_protocol::{ActionId, ExecutionPlan};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Not started because an upstream blocking step failed.
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub action_id: ActionId,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StepReport {
    pub fn new(action_id: impl Into<ActionId>, status: StepStatus) -> Self {
        Self {
            action_id: action_id.into(),
            status,
            message: None,
        }
    }
}

/// The downstream component that actually runs plans. The router never executes actions itself.
#[async_trait]
pub trait ExecutorAdapter: Send + Sync {
    /// Accept a plan for execution. Returning means accepted, not finished.
    async fn dispatch(&self, decision_id: &str, plan: &ExecutionPlan) -> anyhow::Result<()>;

    /// Stop a dispatched plan and report what already ran.
    async fn cancel(&self, decision_id: &str) -> anyhow::Result<Vec<StepReport>>;
}

/// Terminal state implied by the step reports of one plan.
pub fn outcome_state(reports: &[StepReport]) -> SessionState {
    let succeeded = reports
        .iter()
        .filter(|r| r.status == StepStatus::Succeeded)
        .count();
    let failed = reports
        .iter()
        .any(|r| matches!(r.status, StepStatus::Failed | StepStatus::Skipped));

    if reports.is_empty() || reports.iter().all(|r| r.status == StepStatus::Cancelled) {
        SessionState::Cancelled
    } else if succeeded == reports.len() {
        SessionState::Completed
    } else if succeeded == 0 && failed {
        SessionState::Failed
    } else {
        SessionState::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_states() {
        let ok = StepReport::new("a", StepStatus::Succeeded);
        let bad = StepReport::new("b", StepStatus::Failed);
        let skipped = StepReport::new("c", StepStatus::Skipped);
        let cancelled = StepReport::new("d", StepStatus::Cancelled);

        assert_eq!(outcome_state(&[ok.clone()]), SessionState::Completed);
        assert_eq!(outcome_state(&[bad.clone(), skipped.clone()]), SessionState::Failed);
        assert_eq!(outcome_state(&[ok.clone(), bad]), SessionState::Partial);
        assert_eq!(outcome_state(&[ok, cancelled.clone()]), SessionState::Partial);
        assert_eq!(outcome_state(&[cancelled]), SessionState::Cancelled);
        assert_eq!(outcome_state(&[]), SessionState::Cancelled);
    }
}
