use crate::rules::{ActionVerb, RuleCategory, RuleTable};
use crate::tokens::{is_delimiter, is_path_token, is_stop_word};
use router_protocol::ActionId;
use serde::{Deserialize, Serialize};

/// Words that order or separate clauses; their presence between two family mentions marks a
/// compound request.
const SEQUENCE_WORDS: &[&str] = &["then", "before", "after", "finally"];

/// Prepositions that usually introduce the technology a request is about.
const DOMAIN_PREPOSITIONS: &[&str] = &["in", "for", "using", "with"];

/// Nouns that follow a technology name ("in zig code", "with deno project").
const DOMAIN_SUFFIXES: &[&str] = &[
    "code", "codebase", "project", "app", "files", "service", "framework", "library", "language",
    "lang", "stack", "sdk",
];

const MIN_TYPO_LEN: usize = 5;

/// How specific the strongest piece of evidence for a candidate was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    Weak,
    Strong,
    Phrase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentCandidate {
    pub action: ActionId,
    pub category: RuleCategory,
    pub family: Option<ActionVerb>,
    pub matched: Vec<String>,
    pub evidence: Evidence,
    pub base_score: f32,
    /// Index of the first request token that produced evidence.
    pub position: usize,
    /// Index of the first token at the candidate's strongest evidence level.
    pub anchor: usize,
    /// Declaration order in the rule table.
    pub rule_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mention {
    pub action: ActionId,
    pub rule_index: usize,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FamilyMention {
    pub verb: ActionVerb,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MatchReport {
    /// Candidates in rule-table order.
    pub candidates: Vec<IntentCandidate>,
    /// Explicitly named actions in request order.
    pub explicit: Vec<Mention>,
    /// First mention of each verb family in request order.
    pub families: Vec<FamilyMention>,
    pub paths: Vec<String>,
    pub unrecognized_domain: Option<String>,
    /// Token indices of list delimiters and sequencing words.
    pub breaks: Vec<usize>,
    /// Families with two or more members named in separate clauses ("type errors and lint
    /// warnings").
    pub listed: Vec<ActionVerb>,
    /// Two or more families, or two listed members of one family, joined by a list delimiter
    /// or sequencing word.
    pub compound: bool,
}

impl MatchReport {
    pub fn has_strong_evidence(&self) -> bool {
        self.candidates
            .iter()
            .any(|candidate| candidate.evidence > Evidence::Weak)
    }

    pub fn candidate(&self, action: &ActionId) -> Option<&IntentCandidate> {
        self.candidates.iter().find(|c| &c.action == action)
    }

    /// A clause break lies strictly between token positions `a` and `b`.
    pub fn separated(&self, a: usize, b: usize) -> bool {
        separated(&self.breaks, a, b)
    }
}

/// Maps normalized request tokens to intent candidates. Pure: same tokens, same report.
pub struct PatternMatcher<'a> {
    table: &'a RuleTable,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(table: &'a RuleTable) -> Self {
        Self { table }
    }

    pub fn match_tokens(&self, tokens: &[String]) -> MatchReport {
        let scores = self.table.base_scores();
        let mut candidates = Vec::new();

        for (rule_index, rule) in self.table.rules().iter().enumerate() {
            let mut hits: Vec<(Evidence, usize, String)> = Vec::new();

            for phrase in &rule.phrases {
                if let Some(pos) = find_sequence(tokens, phrase) {
                    hits.push((Evidence::Phrase, pos, phrase.join(" ")));
                }
            }
            for (pos, token) in tokens.iter().enumerate() {
                if rule.keywords.iter().any(|kw| kw == token) {
                    hits.push((Evidence::Strong, pos, token.clone()));
                } else if rule.weak_keywords.iter().any(|kw| kw == token) {
                    hits.push((Evidence::Weak, pos, token.clone()));
                } else if let Some(kw) = typo_of(token, &rule.keywords) {
                    hits.push((Evidence::Weak, pos, format!("{token}~{kw}")));
                }
            }
            if let Some(family) = rule.family().and_then(|verb| self.table.family(verb)) {
                for (pos, token) in tokens.iter().enumerate() {
                    if family.words.iter().any(|word| word == token) {
                        hits.push((Evidence::Weak, pos, token.clone()));
                    }
                }
            }

            let Some(evidence) = hits.iter().map(|(evidence, _, _)| *evidence).max() else {
                continue;
            };
            let position = hits.iter().map(|(_, pos, _)| *pos).min().unwrap_or(0);
            let anchor = hits
                .iter()
                .filter(|(level, _, _)| *level == evidence)
                .map(|(_, pos, _)| *pos)
                .min()
                .unwrap_or(position);
            hits.sort_by_key(|(_, pos, _)| *pos);
            let mut matched: Vec<String> = Vec::with_capacity(hits.len());
            for (_, _, word) in hits {
                if !matched.contains(&word) {
                    matched.push(word);
                }
            }

            let base_score = match evidence {
                Evidence::Phrase => scores.phrase,
                Evidence::Strong => scores.strong,
                Evidence::Weak => scores.weak,
            };

            candidates.push(IntentCandidate {
                action: rule.action.clone(),
                category: rule.category(),
                family: rule.family(),
                matched,
                evidence,
                base_score,
                position,
                anchor,
                rule_index,
            });
        }

        let explicit = self.explicit_mentions(tokens);
        let families = self.family_mentions(tokens, &candidates);
        let breaks: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| is_delimiter(t) || SEQUENCE_WORDS.contains(&t.as_str()))
            .map(|(idx, _)| idx)
            .collect();
        let listed = listed_families(&candidates, &breaks);
        let compound = is_compound(&families, &breaks) || !listed.is_empty();
        let paths = tokens
            .iter()
            .filter(|token| is_path_token(token))
            .cloned()
            .collect();
        let domain_matched = candidates
            .iter()
            .any(|c| c.category == RuleCategory::Domain && c.evidence > Evidence::Weak);
        let unrecognized_domain = if domain_matched {
            None
        } else {
            self.unrecognized_domain(tokens)
        };

        log::debug!(
            "matched {} candidates ({} explicit, {} families, {} listed, compound={compound})",
            candidates.len(),
            explicit.len(),
            families.len(),
            listed.len()
        );

        MatchReport {
            candidates,
            explicit,
            families,
            paths,
            unrecognized_domain,
            breaks,
            listed,
            compound,
        }
    }

    fn explicit_mentions(&self, tokens: &[String]) -> Vec<Mention> {
        let mut mentions: Vec<Mention> = Vec::new();
        for (name, rule_index) in self.table.explicit_names() {
            let Some(position) = find_sequence(tokens, name) else {
                continue;
            };
            match mentions.iter_mut().find(|m| m.rule_index == *rule_index) {
                Some(existing) => existing.position = existing.position.min(position),
                None => mentions.push(Mention {
                    action: self.table.rules()[*rule_index].action.clone(),
                    rule_index: *rule_index,
                    position,
                }),
            }
        }
        mentions.sort_by_key(|m| (m.position, m.rule_index));
        mentions
    }

    fn family_mentions(
        &self,
        tokens: &[String],
        candidates: &[IntentCandidate],
    ) -> Vec<FamilyMention> {
        let mut mentions: Vec<FamilyMention> = Vec::new();
        let mut note = |verb: ActionVerb, position: usize| {
            match mentions.iter_mut().find(|m| m.verb == verb) {
                Some(existing) => existing.position = existing.position.min(position),
                None => mentions.push(FamilyMention { verb, position }),
            }
        };

        for family in self.table.families() {
            if let Some(pos) = tokens
                .iter()
                .position(|token| family.words.iter().any(|w| w == token))
            {
                note(family.verb, pos);
            }
        }
        for candidate in candidates {
            if let (Some(verb), true) = (candidate.family, candidate.evidence > Evidence::Weak) {
                note(verb, candidate.position);
            }
        }

        mentions.sort_by_key(|m| (m.position, m.verb));
        mentions
    }

    fn unrecognized_domain(&self, tokens: &[String]) -> Option<String> {
        for (idx, token) in tokens.iter().enumerate() {
            if !DOMAIN_PREPOSITIONS.contains(&token.as_str()) {
                continue;
            }
            let mut next = idx + 1;
            while next < tokens.len() && is_stop_word(&tokens[next]) {
                next += 1;
            }
            let Some(name) = tokens.get(next) else {
                continue;
            };
            if !looks_like_name(name) || self.table.is_vocabulary(name) || is_path_token(name) {
                continue;
            }
            let followed_by_suffix = tokens
                .get(next + 1)
                .is_some_and(|t| DOMAIN_SUFFIXES.contains(&t.as_str()));
            if followed_by_suffix || token == "using" {
                return Some(name.clone());
            }
        }
        None
    }
}

fn looks_like_name(token: &str) -> bool {
    token.len() >= 2
        && token.chars().any(|c| c.is_alphabetic())
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '+' | '#' | '_'))
        && !is_delimiter(token)
        && !SEQUENCE_WORDS.contains(&token)
}

fn find_sequence(tokens: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > tokens.len() {
        return None;
    }
    tokens
        .windows(needle.len())
        .position(|window| window == needle)
}

/// One edit away from a long keyword, e.g. `typscript` for `typescript`.
fn typo_of<'k>(token: &str, keywords: &'k [String]) -> Option<&'k str> {
    if token.chars().count() < MIN_TYPO_LEN {
        return None;
    }
    keywords
        .iter()
        .filter(|kw| kw.chars().count() >= MIN_TYPO_LEN)
        .find(|kw| strsim::levenshtein(token, kw) == 1)
        .map(String::as_str)
}

fn separated(breaks: &[usize], a: usize, b: usize) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    breaks.iter().any(|&idx| lo < idx && idx < hi)
}

fn is_compound(families: &[FamilyMention], breaks: &[usize]) -> bool {
    families.windows(2).any(|pair| {
        let (left, right) = (pair[0], pair[1]);
        left.verb != right.verb
            && right.position > left.position
            && separated(breaks, left.position, right.position)
    })
}

/// Families where two members carry strong evidence in different clauses.
fn listed_families(candidates: &[IntentCandidate], breaks: &[usize]) -> Vec<ActionVerb> {
    let mut listed: Vec<ActionVerb> = Vec::new();
    for (idx, first) in candidates.iter().enumerate() {
        let Some(verb) = first.family else {
            continue;
        };
        if first.evidence == Evidence::Weak || listed.contains(&verb) {
            continue;
        }
        let paired = candidates[idx + 1..].iter().any(|other| {
            other.family == Some(verb)
                && other.evidence > Evidence::Weak
                && separated(breaks, first.anchor, other.anchor)
        });
        if paired {
            listed.push(verb);
        }
    }
    listed
}
