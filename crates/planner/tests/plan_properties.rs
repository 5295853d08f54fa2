use proptest::prelude::*;
use router_planner::{PlanBuilder, PlanIntent, PlanRequest};
use router_protocol::ActionId;
use std::collections::HashMap;

const WORDS: &[&str] = &["then", "before", "after", "and", ",", "the", "x"];
const RESOURCES: &[&str] = &["worktree", "git", "docs"];

fn arb_request() -> impl Strategy<Value = PlanRequest> {
    let intent = (0u8..6, prop::collection::vec(0usize..RESOURCES.len(), 0..3), any::<bool>());
    (
        prop::collection::vec(intent, 1..7),
        prop::collection::vec(0usize..WORDS.len(), 0..12),
    )
        .prop_map(|(specs, filler)| {
            let mut tokens = Vec::new();
            let mut intents = Vec::new();
            let mut filler = filler.into_iter();
            for (idx, (phase, resources, gated)) in specs.into_iter().enumerate() {
                intents.push(PlanIntent {
                    action: ActionId::new(format!("action-{idx}")),
                    position: tokens.len(),
                    phase,
                    resources: resources.iter().map(|r| RESOURCES[*r].to_string()).collect(),
                    gated,
                    destructive: false,
                    writes_git: false,
                    matched: Vec::new(),
                });
                tokens.push(format!("verb{idx}"));
                if let Some(word) = filler.next() {
                    tokens.push(WORDS[word].to_string());
                }
            }
            PlanRequest {
                text: tokens.join(" "),
                tokens,
                intents,
                ..PlanRequest::default()
            }
        })
}

proptest! {
    #[test]
    fn every_plan_is_a_valid_staging(request in arb_request()) {
        let plan = PlanBuilder::new().build(&request).unwrap();

        prop_assert_eq!(plan.step_count(), request.intents.len());

        let stage_of: HashMap<&ActionId, usize> =
            plan.steps().map(|step| (&step.action_id, step.stage)).collect();
        prop_assert_eq!(stage_of.len(), request.intents.len());

        for (index, stage) in plan.stages.iter().enumerate() {
            prop_assert_eq!(stage.index, index);
            prop_assert!(!stage.steps.is_empty());
            for step in &stage.steps {
                prop_assert_eq!(step.stage, index);
                for dep in &step.depends_on {
                    prop_assert!(stage_of[dep] < index, "{} depends on later {}", step.action_id, dep);
                }
            }
        }
    }

    #[test]
    fn blocking_means_a_gated_step_follows(request in arb_request()) {
        let plan = PlanBuilder::new().build(&request).unwrap();
        let last_stage = plan.stages.len() - 1;
        for step in &plan.stages[last_stage].steps {
            prop_assert!(!step.blocking);
        }
        if !request.intents.iter().any(|i| i.gated) {
            prop_assert!(plan.steps().all(|s| !s.blocking));
        }
    }
}
