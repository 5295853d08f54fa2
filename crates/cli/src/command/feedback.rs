use super::{print_json, Environment};
use anyhow::Result;
use router_protocol::{ActionId, FeedbackIngest, FeedbackOutcome};
use serde_json::json;

pub fn feedback(
    env: &Environment,
    decision_id: String,
    outcome: FeedbackOutcome,
    corrected_action: Option<String>,
) -> Result<()> {
    let config = env.load_config()?;
    let store = env.open_store(&config)?;
    store.settle_expired()?;

    let ingest = FeedbackIngest {
        decision_id,
        outcome,
        corrected_action: corrected_action.map(ActionId::new),
    };
    store.ingest(&ingest)?;

    print_json(&json!({
        "decision_id": ingest.decision_id,
        "outcome": ingest.outcome,
        "corrected_action": ingest.corrected_action,
        "generation": store.snapshot().generation(),
    }))
}

pub fn weights(env: &Environment) -> Result<()> {
    let config = env.load_config()?;
    let store = env.open_store(&config)?;
    store.settle_expired()?;

    let snapshot = store.snapshot();
    print_json(&json!({
        "generation": snapshot.generation(),
        "cap": store.policy().cap,
        "pending": store.pending().len(),
        "entries": snapshot.entries(),
    }))
}
