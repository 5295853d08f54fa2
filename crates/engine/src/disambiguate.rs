use crate::scoring::ScoredCandidate;
use router_matcher::{ActionVerb, Evidence, FamilyMention, MatchReport, RuleTable, Suggester};
use router_protocol::{
    ActionId, Clarification, ClarificationCandidate, ClarificationReason,
};
use serde::{Deserialize, Serialize};

/// Why the resolved actions were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// The request named actions outright; confidence was not consulted.
    ExplicitMention,
    /// Several verb families; one intent (or the generic set) per family.
    Compound,
    /// The top candidate cleared the urgency threshold.
    Confident,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAction {
    pub action: ActionId,
    pub confidence: f32,
    /// Token index the plan builder orders by.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        kind: ResolutionKind,
        actions: Vec<ResolvedAction>,
    },
    Clarify(Clarification),
}

#[derive(Debug, Clone)]
pub struct Disambiguator {
    max_candidates: usize,
}

impl Disambiguator {
    pub fn new(max_candidates: usize) -> Self {
        Self {
            max_candidates: max_candidates.clamp(2, 3),
        }
    }

    pub fn decide(
        &self,
        table: &RuleTable,
        report: &MatchReport,
        scored: &[ScoredCandidate],
        tokens: &[String],
        threshold: f32,
    ) -> Resolution {
        let confidence_of = |action: &ActionId| {
            scored
                .iter()
                .find(|c| &c.action == action)
                .map_or(0.0, |c| c.confidence)
        };

        if !report.explicit.is_empty() {
            let mut actions: Vec<ResolvedAction> = report
                .explicit
                .iter()
                .map(|mention| ResolvedAction {
                    action: mention.action.clone(),
                    confidence: confidence_of(&mention.action),
                    position: mention.position,
                })
                .collect();
            actions.extend(self.alongside_explicit(table, report, scored, threshold));
            actions.sort_by_key(|a| a.position);
            return Resolution::Resolved {
                kind: ResolutionKind::ExplicitMention,
                actions,
            };
        }

        if report.compound {
            let actions = self.resolve_per_family(table, report, scored, threshold);
            if !actions.is_empty() {
                return Resolution::Resolved {
                    kind: ResolutionKind::Compound,
                    actions,
                };
            }
        }

        if let Some(top) = scored.first().filter(|top| top.confidence >= threshold) {
            return Resolution::Resolved {
                kind: ResolutionKind::Confident,
                actions: vec![ResolvedAction {
                    action: top.action.clone(),
                    confidence: top.confidence,
                    position: top.position,
                }],
            };
        }

        Resolution::Clarify(self.clarify(table, scored, tokens))
    }

    /// Intents asked for in their own clause next to an explicit name ("fix typescript errors
    /// then git-commit"). Families an explicit name already covers are skipped, and only
    /// confident members are kept.
    fn alongside_explicit(
        &self,
        table: &RuleTable,
        report: &MatchReport,
        scored: &[ScoredCandidate],
        threshold: f32,
    ) -> Vec<ResolvedAction> {
        let covered: Vec<ActionVerb> = report
            .explicit
            .iter()
            .filter_map(|m| table.rules().get(m.rule_index).and_then(|rule| rule.family()))
            .collect();

        let mut actions: Vec<ResolvedAction> = Vec::new();
        for mention in &report.families {
            if covered.contains(&mention.verb) {
                continue;
            }
            let own_clause = report
                .explicit
                .iter()
                .all(|m| report.separated(m.position, mention.position));
            if !own_clause {
                continue;
            }
            for resolved in confident_members(report, scored, mention, threshold) {
                if report.explicit.iter().any(|m| m.action == resolved.action) {
                    continue;
                }
                log::debug!("{} kept next to explicit mention", resolved.action);
                actions.push(resolved);
            }
        }
        actions
    }

    fn resolve_per_family(
        &self,
        table: &RuleTable,
        report: &MatchReport,
        scored: &[ScoredCandidate],
        threshold: f32,
    ) -> Vec<ResolvedAction> {
        let mut actions: Vec<ResolvedAction> = Vec::new();
        let mut push = |action: &ActionId, confidence: f32, position: usize| {
            if !actions.iter().any(|a| &a.action == action) {
                actions.push(ResolvedAction {
                    action: action.clone(),
                    confidence,
                    position,
                });
            }
        };

        for mention in &report.families {
            let confident = confident_members(report, scored, mention, threshold);
            if !confident.is_empty() {
                for resolved in confident {
                    push(&resolved.action, resolved.confidence, resolved.position);
                }
                continue;
            }

            let mut generic = table
                .family_members(mention.verb)
                .filter(|(_, rule)| rule.generic_member)
                .peekable();
            if generic.peek().is_some() {
                for (_, rule) in generic {
                    let confidence = scored
                        .iter()
                        .find(|c| c.action == rule.action)
                        .map_or(0.0, |c| c.confidence);
                    push(&rule.action, confidence, mention.position);
                }
            } else if let Some(best) = scored.iter().find(|c| c.family == Some(mention.verb)) {
                push(&best.action, best.confidence, mention.position);
            }
        }
        actions
    }

    fn clarify(&self, table: &RuleTable, scored: &[ScoredCandidate], tokens: &[String]) -> Clarification {
        let mut candidates: Vec<ClarificationCandidate> = scored
            .iter()
            .take(self.max_candidates)
            .map(|c| ClarificationCandidate {
                action_id: c.action.clone(),
                description: c.description.clone(),
                confidence: c.confidence,
            })
            .collect();
        let suggestions = Suggester::new().suggest(table, tokens, self.max_candidates);

        if candidates.len() == 1 {
            self.pad_candidates(table, scored, &suggestions, &mut candidates);
        }

        if candidates.is_empty() {
            let listed = suggestions
                .iter()
                .map(ActionId::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return Clarification {
                reason: ClarificationReason::NotUnderstood,
                candidates,
                prompt: format!("I could not map that request to an action. Did you mean: {listed}?"),
                suggestions,
            };
        }

        let options = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}) {} - {}", i + 1, c.action_id, c.description))
            .collect::<Vec<_>>()
            .join("; ");
        Clarification {
            reason: ClarificationReason::Ambiguous,
            prompt: format!("Which of these did you mean? {options}"),
            candidates,
            suggestions,
        }
    }

    /// A lone candidate is no choice: add suggestions, then siblings from the same family, then
    /// the table's generic entry points.
    fn pad_candidates(
        &self,
        table: &RuleTable,
        scored: &[ScoredCandidate],
        suggestions: &[ActionId],
        candidates: &mut Vec<ClarificationCandidate>,
    ) {
        let family = scored.first().and_then(|top| top.family);
        let siblings = family
            .into_iter()
            .flat_map(move |verb| table.family_members(verb).map(|(_, rule)| &rule.action));
        let entry_points = table
            .rules()
            .iter()
            .filter(|rule| rule.generic_member)
            .map(|rule| &rule.action);

        for action in suggestions.iter().chain(siblings).chain(entry_points) {
            if candidates.len() >= self.max_candidates {
                break;
            }
            if candidates.iter().any(|c| &c.action_id == action) {
                continue;
            }
            let Some((_, rule)) = table.rule(action) else {
                continue;
            };
            candidates.push(ClarificationCandidate {
                action_id: action.clone(),
                description: rule.description.clone(),
                confidence: scored
                    .iter()
                    .find(|c| &c.action == action)
                    .map_or(0.0, |c| c.confidence),
            });
        }
    }
}

/// Members of `mention`'s family that clear `threshold`: every listed member when the request
/// names several in separate clauses, otherwise the family's best candidate.
fn confident_members(
    report: &MatchReport,
    scored: &[ScoredCandidate],
    mention: &FamilyMention,
    threshold: f32,
) -> Vec<ResolvedAction> {
    if report.listed.contains(&mention.verb) {
        let listed: Vec<ResolvedAction> = scored
            .iter()
            .filter(|c| {
                c.family == Some(mention.verb)
                    && c.evidence > Evidence::Weak
                    && c.confidence >= threshold
            })
            .map(|c| ResolvedAction {
                action: c.action.clone(),
                confidence: c.confidence,
                position: c.anchor,
            })
            .collect();
        if !listed.is_empty() {
            return listed;
        }
    }

    // `scored` is already ranked, so the first family member is the family's best.
    scored
        .iter()
        .find(|c| c.family == Some(mention.verb))
        .filter(|c| c.confidence >= threshold)
        .map(|winner| ResolvedAction {
            action: winner.action.clone(),
            confidence: winner.confidence,
            position: mention.position,
        })
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringDeltas;
    use crate::scoring::ConfidenceScorer;
    use router_context::{ContextSnapshot, DiagnosticCounts, FileTypeMix, GitState};
    use router_feedback::WeightSnapshot;
    use router_matcher::tokens::normalize;
    use router_matcher::PatternMatcher;
    use router_protocol::Urgency;

    fn decide(text: &str, threshold: f32) -> Resolution {
        let table = RuleTable::builtin().unwrap();
        let tokens = normalize(text);
        let report = PatternMatcher::new(&table).match_tokens(&tokens);
        let snapshot = ContextSnapshot::complete(
            GitState::Clean,
            DiagnosticCounts::default(),
            [("ts", 10)].into_iter().collect::<FileTypeMix>(),
            Urgency::Normal,
        );
        let scored = ConfidenceScorer::new(ScoringDeltas::default(), 0.2).score(
            &table,
            &report,
            &snapshot,
            &WeightSnapshot::default(),
        );
        Disambiguator::new(3).decide(&table, &report, &scored, &tokens, threshold)
    }

    fn resolved_ids(resolution: &Resolution) -> (ResolutionKind, Vec<&str>) {
        match resolution {
            Resolution::Resolved { kind, actions } => {
                (*kind, actions.iter().map(|a| a.action.as_str()).collect())
            }
            Resolution::Clarify(c) => panic!("expected resolution, got {c:?}"),
        }
    }

    #[test]
    fn explicit_mention_wins_regardless_of_score() {
        let resolution = decide("please run /security-review on the auth module", 0.99);
        assert_eq!(
            resolved_ids(&resolution),
            (ResolutionKind::ExplicitMention, vec!["security-review"])
        );
    }

    #[test]
    fn explicit_mention_keeps_confident_intent_from_another_clause() {
        let resolution = decide("fix typescript errors then git-commit", 0.6);
        assert_eq!(
            resolved_ids(&resolution),
            (ResolutionKind::ExplicitMention, vec!["fix-types", "git-commit"])
        );
    }

    #[test]
    fn explicit_mention_ignores_modifiers_in_its_own_clause() {
        let resolution = decide("run git-commit for the security fix", 0.6);
        assert_eq!(
            resolved_ids(&resolution),
            (ResolutionKind::ExplicitMention, vec!["git-commit"])
        );
    }

    #[test]
    fn two_listed_fixes_resolve_both() {
        let resolution = decide("fix typescript errors and lint warnings", 0.6);
        assert_eq!(
            resolved_ids(&resolution),
            (ResolutionKind::Compound, vec!["fix-types", "fix-lint"])
        );
    }

    #[test]
    fn compound_request_takes_generic_members_per_family() {
        let resolution = decide("fix, review, and commit", 0.6);
        let (kind, ids) = resolved_ids(&resolution);
        assert_eq!(kind, ResolutionKind::Compound);
        assert_eq!(
            ids,
            vec!["fix-types", "fix-tests", "fix-lint", "code-review", "git-commit"]
        );
    }

    #[test]
    fn ambiguous_request_offers_at_most_three() {
        let Resolution::Clarify(clarification) = decide("fix the bug", 0.6) else {
            panic!("expected clarification");
        };
        assert_eq!(clarification.reason, ClarificationReason::Ambiguous);
        assert_eq!(clarification.candidates.len(), 3);
        assert!(clarification.prompt.starts_with("Which of these did you mean? 1) "));
        assert!(!clarification.suggestions.is_empty());
    }

    #[test]
    fn gibberish_is_not_understood_but_still_suggests() {
        let Resolution::Clarify(clarification) = decide("qqq zzz", 0.6) else {
            panic!("expected clarification");
        };
        assert_eq!(clarification.reason, ClarificationReason::NotUnderstood);
        assert!(clarification.candidates.is_empty());
        assert!(!clarification.suggestions.is_empty());
    }

    #[test]
    fn lone_candidate_is_padded_with_siblings() {
        let Resolution::Clarify(clarification) = decide("flaky", 0.6) else {
            panic!("expected clarification");
        };
        let ids: Vec<&str> = clarification
            .candidates
            .iter()
            .map(|c| c.action_id.as_str())
            .collect();
        assert_eq!(ids[0], "fix-tests");
        assert!(ids.len() >= 2, "{ids:?}");
        assert!(ids.contains(&"fix-types"));
    }

    #[test]
    fn lone_candidate_without_siblings_gets_entry_points() {
        let Resolution::Clarify(clarification) = decide("please explain", 0.6) else {
            panic!("expected clarification");
        };
        assert_eq!(clarification.reason, ClarificationReason::Ambiguous);
        assert!(clarification.candidates.len() >= 2);
        assert_eq!(clarification.candidates[0].action_id.as_str(), "explore-codebase");
        let mut ids: Vec<&str> = clarification
            .candidates
            .iter()
            .map(|c| c.action_id.as_str())
            .collect();
        ids.dedup();
        assert_eq!(ids.len(), clarification.candidates.len());
    }

    #[test]
    fn max_candidates_is_clamped() {
        assert_eq!(Disambiguator::new(10).max_candidates, 3);
        assert_eq!(Disambiguator::new(0).max_candidates, 2);
    }
}
