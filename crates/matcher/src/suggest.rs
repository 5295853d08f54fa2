use crate::rules::{Rule, RuleTable};
use crate::tokens::{is_delimiter, is_stop_word};
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32String};
use router_protocol::ActionId;

const MIN_TOKEN_LEN: usize = 3;
const MIN_SIMILARITY: f64 = 0.75;

/// "Did you mean" suggestions for requests that produced no usable candidate.
///
/// Each request token is scored against every rule by edit distance (keywords, phrase words,
/// aliases) and by fuzzy subsequence matching (action ids). The list is never empty: when
/// nothing resembles the request, the first generic entry points of the table are offered.
pub struct Suggester {
    matcher: Matcher,
}

impl Suggester {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
        }
    }

    pub fn suggest(&mut self, table: &RuleTable, tokens: &[String], limit: usize) -> Vec<ActionId> {
        if limit == 0 {
            return Vec::new();
        }

        let words: Vec<&str> = tokens
            .iter()
            .map(String::as_str)
            .filter(|t| t.chars().count() >= MIN_TOKEN_LEN && !is_stop_word(t) && !is_delimiter(t))
            .collect();

        let mut scored: Vec<(usize, f64)> = Vec::new();
        for (idx, rule) in table.rules().iter().enumerate() {
            let best = words
                .iter()
                .map(|word| {
                    let lexical = lexical_similarity(word, rule);
                    let fuzzy = self.fuzzy_similarity(word, rule);
                    lexical.max(fuzzy)
                })
                .fold(0.0_f64, f64::max);
            if best >= MIN_SIMILARITY {
                scored.push((idx, best));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let mut suggestions: Vec<ActionId> = scored
            .into_iter()
            .take(limit)
            .map(|(idx, _)| table.rules()[idx].action.clone())
            .collect();

        if suggestions.is_empty() {
            suggestions = table
                .rules()
                .iter()
                .filter(|rule| rule.generic_member)
                .take(limit)
                .map(|rule| rule.action.clone())
                .collect();
            log::debug!("no lexical suggestion; offering {} entry points", suggestions.len());
        }

        suggestions
    }

    fn fuzzy_similarity(&mut self, word: &str, rule: &Rule) -> f64 {
        let pattern = Pattern::parse(word, CaseMatching::Ignore, Normalization::Smart);
        let haystack = Utf32String::from(rule.action.as_str());
        let Some(score) = pattern.score(haystack.slice(..), &mut self.matcher) else {
            return 0.0;
        };
        // A perfect contiguous match of the whole word scores roughly 16 points per char plus
        // the prefix bonus; normalize against that so long words are not favoured.
        let ideal = (word.chars().count() as f64) * 16.0 + 16.0;
        (f64::from(score) / ideal).min(1.0)
    }
}

impl Default for Suggester {
    fn default() -> Self {
        Self::new()
    }
}

fn lexical_similarity(word: &str, rule: &Rule) -> f64 {
    rule.keywords
        .iter()
        .chain(rule.weak_keywords.iter())
        .chain(rule.phrases.iter().flatten())
        .chain(rule.aliases.iter().flatten())
        .map(|candidate| strsim::normalized_levenshtein(word, candidate))
        .fold(0.0_f64, f64::max)
}
