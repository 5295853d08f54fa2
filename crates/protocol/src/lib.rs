use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PROTOCOL_SCHEMA_VERSION: u32 = 1;

/// Identifier of a routable action (tool, command or agent), e.g. `fix-types`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Critical => "critical",
            Urgency::High => "high",
            Urgency::Normal => "normal",
            Urgency::Low => "low",
        }
    }

    /// The more urgent of the two levels.
    #[must_use]
    pub fn escalate(self, other: Urgency) -> Urgency {
        let rank = |u: Urgency| match u {
            Urgency::Critical => 0,
            Urgency::High => 1,
            Urgency::Normal => 2,
            Urgency::Low => 3,
        };
        if rank(other) < rank(self) {
            other
        } else {
            self
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Urgency::Critical),
            "high" => Some(Urgency::High),
            "normal" => Some(Urgency::Normal),
            "low" => Some(Urgency::Low),
            _ => None,
        }
    }
}

/// A free-text request as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteRequest {
    pub text: String,
    /// Explicit urgency; wins over phrasing-based detection.
    #[serde(default)]
    pub urgency: Option<Urgency>,
}

impl RouteRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            urgency: None,
        }
    }

    #[must_use]
    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepDescriptor {
    pub action_id: ActionId,
    pub params: serde_json::Value,
    /// Downstream stages must wait for this step's success, not just completion.
    pub blocking: bool,
    pub requires_confirmation: bool,
    pub stage: usize,
    #[serde(default)]
    pub depends_on: Vec<ActionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanStage {
    pub index: usize,
    /// Steps within a stage carry no ordering guarantee relative to each other.
    pub steps: Vec<StepDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionPlan {
    pub stages: Vec<PlanStage>,
    /// Set when inferred ordering was contradictory and the plan degraded
    /// to appearance order.
    #[serde(default)]
    pub sequential_fallback: bool,
}

impl ExecutionPlan {
    pub fn steps(&self) -> impl Iterator<Item = &StepDescriptor> {
        self.stages.iter().flat_map(|stage| stage.steps.iter())
    }

    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.steps.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.step_count() == 0
    }

    pub fn stage_of(&self, action: &ActionId) -> Option<usize> {
        self.steps()
            .find(|step| &step.action_id == action)
            .map(|step| step.stage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClarificationCandidate {
    pub action_id: ActionId,
    pub description: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationReason {
    /// Candidates exist but none is confident enough.
    Ambiguous,
    /// Nothing in the rule table matched.
    NotUnderstood,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Clarification {
    pub reason: ClarificationReason,
    pub candidates: Vec<ClarificationCandidate>,
    /// "Did you mean" list from fuzzy matching against every known action.
    #[serde(default)]
    pub suggestions: Vec<ActionId>,
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Accepted,
    Corrected,
    /// Reported by the executor when a dispatched step failed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackIngest {
    pub decision_id: String,
    pub outcome: FeedbackOutcome,
    #[serde(default)]
    pub corrected_action: Option<ActionId>,
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn urgency_uses_snake_case_on_the_wire() {
        let raw = serialize_json(&Urgency::Critical).unwrap();
        assert_eq!(raw, "\"critical\"");
        assert_eq!(Urgency::parse(" LOW "), Some(Urgency::Low));
        assert_eq!(Urgency::parse("whenever"), None);
    }

    #[test]
    fn escalate_keeps_the_more_urgent_level() {
        assert_eq!(Urgency::Normal.escalate(Urgency::Critical), Urgency::Critical);
        assert_eq!(Urgency::High.escalate(Urgency::Low), Urgency::High);
        assert_eq!(Urgency::Low.escalate(Urgency::Low), Urgency::Low);
    }

    #[test]
    fn feedback_ingest_defaults_missing_correction() {
        let ingest: FeedbackIngest =
            serde_json::from_str(r#"{"decision_id":"d1","outcome":"accepted"}"#).unwrap();
        assert_eq!(ingest.outcome, FeedbackOutcome::Accepted);
        assert_eq!(ingest.corrected_action, None);
    }

    #[test]
    fn plan_lookup_reports_stage() {
        let step = |id: &str, stage: usize| StepDescriptor {
            action_id: ActionId::from(id),
            params: serde_json::Value::Null,
            blocking: false,
            requires_confirmation: false,
            stage,
            depends_on: Vec::new(),
        };
        let plan = ExecutionPlan {
            stages: vec![
                PlanStage {
                    index: 0,
                    steps: vec![step("fix-lint", 0)],
                },
                PlanStage {
                    index: 1,
                    steps: vec![step("commit", 1)],
                },
            ],
            sequential_fallback: false,
        };
        assert_eq!(plan.step_count(), 2);
        assert_eq!(plan.stage_of(&ActionId::from("commit")), Some(1));
        assert_eq!(plan.stage_of(&ActionId::from("deploy")), None);
    }
}
