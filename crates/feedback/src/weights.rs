use crate::record::{FeedbackRecord, RecordOutcome};
use router_protocol::ActionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Step sizes and bounds of the learning rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackPolicy {
    pub success_step: f32,
    pub correction_step: f32,
    pub cap: f32,
    /// Time a decision stays open for corrections before it counts as a success.
    pub window: Duration,
}

impl Default for FeedbackPolicy {
    fn default() -> Self {
        Self {
            success_step: 0.02,
            correction_step: 0.1,
            cap: 0.2,
            window: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub action: ActionId,
    pub fingerprint: String,
    pub delta: f32,
}

/// Read-only weight table derived from the record log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightSnapshot {
    generation: u64,
    weights: BTreeMap<(String, ActionId), f32>,
}

impl WeightSnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Learned adjustment for `action` under `fingerprint`; zero when nothing was learned.
    pub fn delta(&self, action: &ActionId, fingerprint: &str) -> f32 {
        self.weights
            .get(&(fingerprint.to_string(), action.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn entries(&self) -> Vec<WeightEntry> {
        self.weights
            .iter()
            .map(|((fingerprint, action), delta)| WeightEntry {
                action: action.clone(),
                fingerprint: fingerprint.clone(),
                delta: *delta,
            })
            .collect()
    }
}

/// Replay the log from zero. Every step saturates at `±cap`, so the order of records matters
/// only near the bound.
pub fn recompute(records: &[FeedbackRecord], policy: &FeedbackPolicy, generation: u64) -> WeightSnapshot {
    let mut weights: BTreeMap<(String, ActionId), f32> = BTreeMap::new();
    let cap = policy.cap.abs();
    let mut nudge = |action: &ActionId, fingerprint: &str, step: f32| {
        let entry = weights
            .entry((fingerprint.to_string(), action.clone()))
            .or_insert(0.0);
        *entry = (*entry + step).clamp(-cap, cap);
    };

    for record in records {
        match record.outcome {
            RecordOutcome::Success => {
                nudge(&record.action, &record.fingerprint, policy.success_step);
            }
            RecordOutcome::Corrected => {
                nudge(&record.action, &record.fingerprint, -policy.correction_step);
                if let Some(corrected) = &record.corrected_action {
                    nudge(corrected, &record.fingerprint, policy.correction_step);
                }
            }
            RecordOutcome::Failed => {}
        }
    }

    weights.retain(|_, delta| *delta != 0.0);
    WeightSnapshot {
        generation,
        weights,
    }
}
