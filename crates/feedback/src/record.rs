use router_protocol::ActionId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Accepted explicitly, or left uncorrected for the whole window.
    Success,
    Corrected,
    /// Dispatch failed; cancels the implicit success without moving weights.
    Failed,
}

/// One line of the append-only feedback log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub decision_id: String,
    pub action: ActionId,
    pub fingerprint: String,
    pub outcome: RecordOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_action: Option<ActionId>,
    pub timestamp_ms: u64,
}

/// A routed decision still inside its correction window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub decision_id: String,
    pub actions: Vec<ActionId>,
    pub fingerprint: String,
    pub registered_ms: u64,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
