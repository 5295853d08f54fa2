use proptest::prelude::*;
use router_context::{ContextSnapshot, DiagnosticCounts, FileTypeMix, GitState, Probe};
use router_engine::{ConfidenceScorer, ScoringDeltas};
use router_feedback::{recompute, FeedbackPolicy, FeedbackRecord, RecordOutcome};
use router_matcher::tokens::normalize;
use router_matcher::{PatternMatcher, RuleTable};
use router_protocol::{ActionId, Urgency};

const REQUESTS: &[&str] = &[
    "fix typescript errors",
    "fix the bug",
    "fix, review, and commit",
    "review my changes then push to origin",
    "the docker container keeps dying",
    "optimize the hot path in src/engine.rs",
    "deploy to production using zorblang framework",
    "qqq zzz",
];

const ACTIONS: &[&str] = &[
    "fix-types",
    "fix-tests",
    "fix-lint",
    "code-review",
    "security-review",
    "git-push",
    "runtime-containers",
];

fn arb_deltas() -> impl Strategy<Value = ScoringDeltas> {
    (
        (0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0),
        (-1.0f32..=0.0, -1.0f32..=0.0, -1.0f32..=0.0, -1.0f32..=0.0, -1.0f32..=0.0),
    )
        .prop_map(|((a, b, c, d), (e, f, g, h, i))| ScoringDeltas {
            exact_keyword_match: a,
            context_confirms_intent: b,
            explicit_file_path: c,
            domain_clearly_stated: d,
            generic_request: e,
            ambiguous_multi_interpretation: f,
            conflicting_signals: g,
            missing_context_source: h,
            unrecognized_domain: i,
        })
}

fn arb_git() -> impl Strategy<Value = Probe<GitState>> {
    prop_oneof![
        Just(Probe::available(GitState::Clean)),
        Just(Probe::available(GitState::Modified)),
        Just(Probe::available(GitState::Ahead)),
        Just(Probe::available(GitState::Conflict)),
        Just(Probe::unavailable("timed out")),
    ]
}

fn arb_snapshot() -> impl Strategy<Value = ContextSnapshot> {
    (arb_git(), 0u32..4, 0u32..4, 0u32..4, any::<bool>()).prop_map(
        |(git, type_errors, test_failures, lint_warnings, mix_available)| ContextSnapshot {
            git,
            diagnostics: Probe::available(DiagnosticCounts {
                type_errors,
                test_failures,
                lint_warnings,
            }),
            file_mix: if mix_available {
                Probe::available([("ts", 10), ("rs", 3)].into_iter().collect::<FileTypeMix>())
            } else {
                Probe::unavailable("walk failed")
            },
            urgency: Urgency::Normal,
        },
    )
}

fn arb_records() -> impl Strategy<Value = Vec<(usize, usize, u8)>> {
    prop::collection::vec((0..ACTIONS.len(), 0..ACTIONS.len(), 0u8..3), 0..60)
}

proptest! {
    #[test]
    fn confidence_stays_in_unit_interval(
        request in prop::sample::select(REQUESTS),
        deltas in arb_deltas(),
        snapshot in arb_snapshot(),
        raw_records in arb_records(),
        cap in 0.01f32..=0.2,
    ) {
        let table = RuleTable::builtin().unwrap();
        let report = PatternMatcher::new(&table).match_tokens(&normalize(request));
        let fingerprint = snapshot.fingerprint();
        let records: Vec<FeedbackRecord> = raw_records
            .into_iter()
            .enumerate()
            .map(|(i, (action, target, outcome))| FeedbackRecord {
                decision_id: format!("d{i}"),
                action: ActionId::from(ACTIONS[action]),
                fingerprint: fingerprint.clone(),
                outcome: match outcome {
                    0 => RecordOutcome::Success,
                    1 => RecordOutcome::Corrected,
                    _ => RecordOutcome::Failed,
                },
                corrected_action: (outcome == 1).then(|| ActionId::from(ACTIONS[target])),
                timestamp_ms: i as u64,
            })
            .collect();
        let policy = FeedbackPolicy { cap, ..FeedbackPolicy::default() };
        let weights = recompute(&records, &policy, 1);

        let scored = ConfidenceScorer::new(deltas, cap).score(&table, &report, &snapshot, &weights);

        for candidate in &scored {
            prop_assert!((0.0..=1.0).contains(&candidate.confidence), "{candidate:?}");
            prop_assert!(candidate.feedback_delta.abs() <= cap + 1e-6);
        }
        for pair in scored.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
}
