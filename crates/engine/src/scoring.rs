use crate::config::ScoringDeltas;
use router_context::ContextSnapshot;
use router_feedback::WeightSnapshot;
use router_matcher::{ActionVerb, Evidence, IntentCandidate, MatchReport, RuleCategory, RuleTable};
use router_protocol::ActionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scoring adjustments, declared in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Adjustment {
    ExactKeywordMatch,
    ContextConfirmsIntent,
    ExplicitFilePath,
    DomainClearlyStated,
    GenericRequest,
    AmbiguousMultiInterpretation,
    ConflictingSignals,
    MissingContextSource,
    UnrecognizedDomain,
}

impl Adjustment {
    pub fn as_str(self) -> &'static str {
        match self {
            Adjustment::ExactKeywordMatch => "exact-keyword-match",
            Adjustment::ContextConfirmsIntent => "context-confirms-intent",
            Adjustment::ExplicitFilePath => "explicit-file-path",
            Adjustment::DomainClearlyStated => "domain-clearly-stated",
            Adjustment::GenericRequest => "generic-request",
            Adjustment::AmbiguousMultiInterpretation => "ambiguous-multi-interpretation",
            Adjustment::ConflictingSignals => "conflicting-signals",
            Adjustment::MissingContextSource => "missing-context-source",
            Adjustment::UnrecognizedDomain => "unrecognized-domain",
        }
    }

    pub fn delta(self, deltas: &ScoringDeltas) -> f32 {
        match self {
            Adjustment::ExactKeywordMatch => deltas.exact_keyword_match,
            Adjustment::ContextConfirmsIntent => deltas.context_confirms_intent,
            Adjustment::ExplicitFilePath => deltas.explicit_file_path,
            Adjustment::DomainClearlyStated => deltas.domain_clearly_stated,
            Adjustment::GenericRequest => deltas.generic_request,
            Adjustment::AmbiguousMultiInterpretation => deltas.ambiguous_multi_interpretation,
            Adjustment::ConflictingSignals => deltas.conflicting_signals,
            Adjustment::MissingContextSource => deltas.missing_context_source,
            Adjustment::UnrecognizedDomain => deltas.unrecognized_domain,
        }
    }
}

/// One adjustment that fired for a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    pub adjustment: Adjustment,
    pub delta: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub action: ActionId,
    pub category: RuleCategory,
    pub family: Option<ActionVerb>,
    pub description: String,
    pub evidence: Evidence,
    pub matched: Vec<String>,
    pub position: usize,
    #[serde(default)]
    pub anchor: usize,
    pub rule_index: usize,
    pub base_score: f32,
    pub adjustments: Vec<AppliedAdjustment>,
    pub feedback_delta: f32,
    /// Final score in [0, 1].
    pub confidence: f32,
}

/// Deterministic confidence pipeline: base score, ordered adjustments, bounded learned delta,
/// clamp. Summation is plain addition; only the end result is clamped.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    deltas: ScoringDeltas,
    feedback_cap: f32,
}

impl ConfidenceScorer {
    pub fn new(deltas: ScoringDeltas, feedback_cap: f32) -> Self {
        Self {
            deltas,
            feedback_cap: feedback_cap.abs(),
        }
    }

    /// Score every candidate of `report` and sort: confidence descending, then action rules
    /// before domain rules, then table order.
    pub fn score(
        &self,
        table: &RuleTable,
        report: &MatchReport,
        snapshot: &ContextSnapshot,
        weights: &WeightSnapshot,
    ) -> Vec<ScoredCandidate> {
        let fingerprint = snapshot.fingerprint();
        let family_best = family_best_scores(&report.candidates);
        let missing = snapshot.unavailable_sources();

        let mut scored: Vec<ScoredCandidate> = report
            .candidates
            .iter()
            .filter_map(|candidate| {
                let rule = table.rules().get(candidate.rule_index)?;
                let mut fired: Vec<(Adjustment, Option<String>)> = Vec::new();

                if candidate.evidence >= Evidence::Strong {
                    fired.push((Adjustment::ExactKeywordMatch, None));
                }
                if let Some(signal) = rule
                    .confirmed_by
                    .iter()
                    .find(|signal| snapshot.signal(signal) == Some(true))
                {
                    fired.push((Adjustment::ContextConfirmsIntent, Some(signal.to_string())));
                }
                if candidate.category == RuleCategory::Action && !report.paths.is_empty() {
                    fired.push((Adjustment::ExplicitFilePath, Some(report.paths.join(" "))));
                }
                if let Some(domain) = rule.domain {
                    // A domain rule's own keyword does not count as stating its domain.
                    let stated = report.candidates.iter().any(|other| {
                        other.rule_index != candidate.rule_index
                            && other.category == RuleCategory::Domain
                            && other.evidence >= Evidence::Strong
                            && table
                                .rules()
                                .get(other.rule_index)
                                .and_then(|r| r.domain)
                                == Some(domain)
                    });
                    if stated {
                        fired.push((Adjustment::DomainClearlyStated, None));
                    }
                }
                if candidate.evidence == Evidence::Weak && !report.has_strong_evidence() {
                    fired.push((Adjustment::GenericRequest, None));
                }
                if let Some(verb) = candidate.family {
                    let listed =
                        report.listed.contains(&verb) && candidate.evidence > Evidence::Weak;
                    if let Some(&(best, count)) = family_best.get(&verb) {
                        if count >= 2 && candidate.base_score == best && !listed {
                            fired.push((
                                Adjustment::AmbiguousMultiInterpretation,
                                Some(format!("{count} {} candidates", verb.as_str())),
                            ));
                        }
                    }
                }
                if !rule.confirmed_by.is_empty() {
                    let answers: Vec<Option<bool>> =
                        rule.confirmed_by.iter().map(|s| snapshot.signal(s)).collect();
                    let any_present = answers.contains(&Some(true));
                    let any_answered = answers.iter().any(Option::is_some);
                    if any_answered && !any_present {
                        fired.push((Adjustment::ConflictingSignals, None));
                    }
                }
                for source in &missing {
                    fired.push((Adjustment::MissingContextSource, Some(source.to_string())));
                }
                if let Some(name) = &report.unrecognized_domain {
                    fired.push((Adjustment::UnrecognizedDomain, Some(name.clone())));
                }

                Some(self.finish(candidate, &rule.description, fired, weights, &fingerprint))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.category.cmp(&b.category))
                .then(a.rule_index.cmp(&b.rule_index))
        });

        for candidate in &scored {
            log::debug!(
                "{} base={:.2} [{}] feedback={:+.2} -> {:.2}",
                candidate.action,
                candidate.base_score,
                candidate
                    .adjustments
                    .iter()
                    .map(|a| format!("{}{:+.2}", a.adjustment.as_str(), a.delta))
                    .collect::<Vec<_>>()
                    .join(" "),
                candidate.feedback_delta,
                candidate.confidence
            );
        }
        scored
    }

    fn finish(
        &self,
        candidate: &IntentCandidate,
        description: &str,
        fired: Vec<(Adjustment, Option<String>)>,
        weights: &WeightSnapshot,
        fingerprint: &str,
    ) -> ScoredCandidate {
        let adjustments: Vec<AppliedAdjustment> = fired
            .into_iter()
            .map(|(adjustment, detail)| AppliedAdjustment {
                adjustment,
                delta: adjustment.delta(&self.deltas),
                detail,
            })
            .collect();
        let feedback_delta = weights
            .delta(&candidate.action, fingerprint)
            .clamp(-self.feedback_cap, self.feedback_cap);
        let raw = candidate.base_score
            + adjustments.iter().map(|a| a.delta).sum::<f32>()
            + feedback_delta;
        let confidence = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) };

        ScoredCandidate {
            action: candidate.action.clone(),
            category: candidate.category,
            family: candidate.family,
            description: description.to_string(),
            evidence: candidate.evidence,
            matched: candidate.matched.clone(),
            position: candidate.position,
            anchor: candidate.anchor,
            rule_index: candidate.rule_index,
            base_score: candidate.base_score,
            adjustments,
            feedback_delta,
            confidence,
        }
    }
}

/// Best base score per family and how many candidates share it.
fn family_best_scores(candidates: &[IntentCandidate]) -> HashMap<ActionVerb, (f32, usize)> {
    let mut best: HashMap<ActionVerb, (f32, usize)> = HashMap::new();
    for candidate in candidates {
        let Some(verb) = candidate.family else {
            continue;
        };
        let entry = best.entry(verb).or_insert((candidate.base_score, 0));
        if candidate.base_score > entry.0 {
            *entry = (candidate.base_score, 1);
        } else if candidate.base_score == entry.0 {
            entry.1 += 1;
        }
    }
    best
}
