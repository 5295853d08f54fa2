use crate::error::{MatcherError, Result};
use crate::tokens::normalize;
use router_protocol::ActionId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const BUILTIN_RULES: &str = include_str!("../../../rules/default.toml");

pub const RULES_SCHEMA_VERSION: u32 = 1;
const MAX_BASE_SCORE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionVerb {
    Fix,
    Review,
    Document,
    Test,
    Build,
    Explore,
    Plan,
    Commit,
    Deploy,
    Optimize,
}

impl ActionVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionVerb::Fix => "fix",
            ActionVerb::Review => "review",
            ActionVerb::Document => "document",
            ActionVerb::Test => "test",
            ActionVerb::Build => "build",
            ActionVerb::Explore => "explore",
            ActionVerb::Plan => "plan",
            ActionVerb::Commit => "commit",
            ActionVerb::Deploy => "deploy",
            ActionVerb::Optimize => "optimize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Language,
    Framework,
    Security,
    Testing,
    Docs,
    Architecture,
    Runtime,
    Ai,
}

/// Rule discriminator: action-based rules belong to a verb family, domain-based rules to a
/// knowledge area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    Action { verb: ActionVerb },
    Domain { domain: Domain },
}

/// Coarse category of a rule. The declaration order of the variants is the tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Action,
    Domain,
}

impl RuleKind {
    pub fn category(&self) -> RuleCategory {
        match self {
            RuleKind::Action { .. } => RuleCategory::Action,
            RuleKind::Domain { .. } => RuleCategory::Domain,
        }
    }
}

/// Repository signal that corroborates a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContextSignal {
    TypeErrors,
    TestFailures,
    LintWarnings,
    UncommittedChanges,
    UnpushedCommits,
    MergeConflict,
    /// Files with this extension are present in the workspace.
    FileType(String),
}

impl ContextSignal {
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            ContextSignal::TypeErrors | ContextSignal::TestFailures | ContextSignal::LintWarnings
        )
    }

    pub fn is_git(&self) -> bool {
        matches!(
            self,
            ContextSignal::UncommittedChanges
                | ContextSignal::UnpushedCommits
                | ContextSignal::MergeConflict
        )
    }
}

impl FromStr for ContextSignal {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Some(ext) = raw.strip_prefix("file_type:") {
            let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if ext.is_empty() {
                return Err("file_type signal needs an extension".to_string());
            }
            return Ok(ContextSignal::FileType(ext));
        }
        match raw {
            "type_errors" => Ok(ContextSignal::TypeErrors),
            "test_failures" => Ok(ContextSignal::TestFailures),
            "lint_warnings" => Ok(ContextSignal::LintWarnings),
            "uncommitted_changes" => Ok(ContextSignal::UncommittedChanges),
            "unpushed_commits" => Ok(ContextSignal::UnpushedCommits),
            "merge_conflict" => Ok(ContextSignal::MergeConflict),
            other => Err(format!("unknown context signal '{other}'")),
        }
    }
}

impl TryFrom<String> for ContextSignal {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContextSignal> for String {
    fn from(value: ContextSignal) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ContextSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSignal::TypeErrors => f.write_str("type_errors"),
            ContextSignal::TestFailures => f.write_str("test_failures"),
            ContextSignal::LintWarnings => f.write_str("lint_warnings"),
            ContextSignal::UncommittedChanges => f.write_str("uncommitted_changes"),
            ContextSignal::UnpushedCommits => f.write_str("unpushed_commits"),
            ContextSignal::MergeConflict => f.write_str("merge_conflict"),
            ContextSignal::FileType(ext) => write!(f, "file_type:{ext}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaseScores {
    pub phrase: f32,
    pub strong: f32,
    pub weak: f32,
}

impl Default for BaseScores {
    fn default() -> Self {
        Self {
            phrase: 0.5,
            strong: 0.35,
            weak: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    pub verb: ActionVerb,
    pub words: Vec<String>,
    /// Workflow phase; lower phases run first when actions share a resource.
    pub phase: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub action: ActionId,
    pub kind: RuleKind,
    /// Knowledge area of the rule. Always set for domain rules.
    pub domain: Option<Domain>,
    pub description: String,
    pub phrases: Vec<Vec<String>>,
    pub keywords: Vec<String>,
    pub weak_keywords: Vec<String>,
    pub aliases: Vec<Vec<String>>,
    pub confirmed_by: Vec<ContextSignal>,
    pub resources: Vec<String>,
    /// Included when a compound request mentions the family only generically.
    pub generic_member: bool,
    /// Must not start before every upstream step succeeded (commits, deploys).
    pub gated: bool,
    /// Irreversible; dispatchers must ask before running it.
    pub destructive: bool,
}

impl Rule {
    pub fn family(&self) -> Option<ActionVerb> {
        match self.kind {
            RuleKind::Action { verb } => Some(verb),
            RuleKind::Domain { .. } => None,
        }
    }

    pub fn category(&self) -> RuleCategory {
        self.kind.category()
    }

    pub fn writes_git(&self) -> bool {
        self.resources.iter().any(|r| r == "git" || r == "remote")
    }
}

/// Validated, ordered rule table.
#[derive(Debug, Clone)]
pub struct RuleTable {
    base_scores: BaseScores,
    families: Vec<Family>,
    rules: Vec<Rule>,
    vocabulary: HashSet<String>,
    explicit_names: Vec<(Vec<String>, usize)>,
}

impl RuleTable {
    /// The table shipped with the router.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            MatcherError::InvalidRule { path: rule, message } => MatcherError::InvalidRule {
                path: format!("{}:{rule}", path.display()),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let raw: RawTable = toml::from_str(raw)?;
        Self::from_raw(raw)
    }

    pub fn base_scores(&self) -> BaseScores {
        self.base_scores
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn family(&self, verb: ActionVerb) -> Option<&Family> {
        self.families.iter().find(|family| family.verb == verb)
    }

    pub fn phase(&self, verb: ActionVerb) -> u8 {
        self.family(verb).map_or(u8::MAX, |family| family.phase)
    }

    pub fn rule(&self, action: &ActionId) -> Option<(usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| &rule.action == action)
    }

    pub fn family_members(&self, verb: ActionVerb) -> impl Iterator<Item = (usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.family() == Some(verb))
    }

    /// True when the token is evidence for any rule or family.
    pub fn is_vocabulary(&self, token: &str) -> bool {
        self.vocabulary.contains(token)
    }

    /// Names (action ids and aliases) that unambiguously identify one rule.
    pub fn explicit_names(&self) -> &[(Vec<String>, usize)] {
        &self.explicit_names
    }

    fn from_raw(raw: RawTable) -> Result<Self> {
        if let Some(version) = raw.schema_version {
            if version != RULES_SCHEMA_VERSION {
                return Err(MatcherError::InvalidTable(format!(
                    "schema_version {version} is not supported (expected {RULES_SCHEMA_VERSION})"
                )));
            }
        }

        let base_scores = BaseScores::from_raw(raw.base_scores)?;

        let mut families = Vec::with_capacity(raw.families.len());
        for (idx, family) in raw.families.into_iter().enumerate() {
            let path = format!("family[{idx}]");
            if families.iter().any(|f: &Family| f.verb == family.verb) {
                return Err(invalid(&path, format!("duplicate family '{}'", family.verb.as_str())));
            }
            let words = normalize_words(&family.words);
            if words.is_empty() {
                return Err(invalid(&path, "family needs at least one word"));
            }
            families.push(Family {
                verb: family.verb,
                words,
                phase: family.phase,
            });
        }

        let mut rules: Vec<Rule> = Vec::with_capacity(raw.rules.len());
        for (idx, rule) in raw.rules.into_iter().enumerate() {
            let path = format!("rule[{idx}]");
            let rule = rule.validate(&path, &families)?;
            if rules.iter().any(|r| r.action == rule.action) {
                return Err(invalid(&path, format!("duplicate action '{}'", rule.action)));
            }
            rules.push(rule);
        }
        if rules.is_empty() {
            return Err(MatcherError::InvalidTable("rule table has no rules".to_string()));
        }

        let vocabulary = build_vocabulary(&families, &rules);
        let explicit_names = build_explicit_names(&rules, &vocabulary);

        Ok(Self {
            base_scores,
            families,
            rules,
            vocabulary,
            explicit_names,
        })
    }
}

fn invalid(path: &str, message: impl Into<String>) -> MatcherError {
    MatcherError::InvalidRule {
        path: path.to_string(),
        message: message.into(),
    }
}

fn normalize_words(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn build_vocabulary(families: &[Family], rules: &[Rule]) -> HashSet<String> {
    let mut vocabulary: HashSet<String> = families
        .iter()
        .flat_map(|family| family.words.iter().cloned())
        .collect();
    for rule in rules {
        vocabulary.extend(rule.keywords.iter().cloned());
        vocabulary.extend(rule.weak_keywords.iter().cloned());
        vocabulary.extend(rule.phrases.iter().flatten().cloned());
    }
    vocabulary
}

/// A name is explicit only if it points at exactly one rule and is not ordinary evidence
/// (`git-commit` qualifies, `commit` does not).
fn build_explicit_names(rules: &[Rule], vocabulary: &HashSet<String>) -> Vec<(Vec<String>, usize)> {
    let phrases: HashSet<&Vec<String>> = rules.iter().flat_map(|r| r.phrases.iter()).collect();
    let mut owners: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    let mut order: Vec<Vec<String>> = Vec::new();

    for (idx, rule) in rules.iter().enumerate() {
        let names = std::iter::once(vec![rule.action.as_str().to_string()])
            .chain(rule.aliases.iter().cloned());
        for name in names {
            let ambiguous = match name.as_slice() {
                [single] => vocabulary.contains(single),
                _ => phrases.contains(&name),
            };
            if ambiguous {
                continue;
            }
            let entry = owners.entry(name.clone()).or_default();
            if entry.is_empty() {
                order.push(name);
            }
            if !entry.contains(&idx) {
                entry.push(idx);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|name| match owners.get(&name).map(Vec::as_slice) {
            Some([idx]) => Some((name, *idx)),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    schema_version: Option<u32>,
    base_scores: Option<RawBaseScores>,
    #[serde(default, rename = "family")]
    families: Vec<RawFamily>,
    #[serde(default, rename = "rule")]
    rules: Vec<RawRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBaseScores {
    phrase: Option<f32>,
    strong: Option<f32>,
    weak: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFamily {
    verb: ActionVerb,
    words: Vec<String>,
    #[serde(default)]
    phase: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawKind {
    Action,
    Domain,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    action: String,
    kind: RawKind,
    verb: Option<ActionVerb>,
    domain: Option<Domain>,
    description: Option<String>,
    #[serde(default)]
    phrases: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    weak_keywords: Vec<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    confirmed_by: Vec<String>,
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    generic_member: bool,
    #[serde(default)]
    gated: bool,
    #[serde(default)]
    destructive: bool,
}

impl BaseScores {
    fn from_raw(raw: Option<RawBaseScores>) -> Result<Self> {
        let defaults = Self::default();
        let raw = raw.unwrap_or_default();
        let scores = Self {
            phrase: raw.phrase.unwrap_or(defaults.phrase),
            strong: raw.strong.unwrap_or(defaults.strong),
            weak: raw.weak.unwrap_or(defaults.weak),
        };

        for (name, value) in [
            ("phrase", scores.phrase),
            ("strong", scores.strong),
            ("weak", scores.weak),
        ] {
            if !value.is_finite() || !(0.0..=MAX_BASE_SCORE).contains(&value) {
                return Err(invalid(
                    &format!("base_scores.{name}"),
                    format!("must be within [0, {MAX_BASE_SCORE}], got {value}"),
                ));
            }
        }
        if scores.phrase < scores.strong || scores.strong < scores.weak {
            return Err(MatcherError::InvalidTable(
                "base_scores must satisfy phrase >= strong >= weak".to_string(),
            ));
        }
        Ok(scores)
    }
}

impl RawRule {
    fn validate(self, path: &str, families: &[Family]) -> Result<Rule> {
        let action = self.action.trim().to_ascii_lowercase();
        if action.is_empty() || action.contains(char::is_whitespace) {
            return Err(invalid(path, "action id must be a single non-empty word"));
        }
        let path = format!("{path}({action})");
        let path = path.as_str();

        let kind = match (self.kind, self.verb, self.domain) {
            (RawKind::Action, Some(verb), _) => {
                if !families.iter().any(|f| f.verb == verb) {
                    return Err(invalid(
                        path,
                        format!("verb '{}' has no family entry", verb.as_str()),
                    ));
                }
                RuleKind::Action { verb }
            }
            (RawKind::Action, None, _) => return Err(invalid(path, "action rule needs a verb")),
            (RawKind::Domain, None, Some(domain)) => RuleKind::Domain { domain },
            (RawKind::Domain, Some(_), _) => {
                return Err(invalid(path, "domain rule cannot declare a verb"))
            }
            (RawKind::Domain, None, None) => {
                return Err(invalid(path, "domain rule needs a domain"))
            }
        };

        if self.generic_member && matches!(kind, RuleKind::Domain { .. }) {
            return Err(invalid(path, "generic_member is only valid on action rules"));
        }

        let mut phrases = Vec::with_capacity(self.phrases.len());
        for phrase in &self.phrases {
            let words = normalize(phrase);
            if words.len() < 2 {
                return Err(invalid(
                    path,
                    format!("phrase '{phrase}' must have at least two words"),
                ));
            }
            phrases.push(words);
        }

        let aliases: Vec<Vec<String>> = self
            .aliases
            .iter()
            .map(|alias| normalize(alias))
            .filter(|words| !words.is_empty())
            .collect();

        let keywords = normalize_words(&self.keywords);
        let weak_keywords = normalize_words(&self.weak_keywords);
        if phrases.is_empty()
            && keywords.is_empty()
            && weak_keywords.is_empty()
            && matches!(kind, RuleKind::Domain { .. })
        {
            return Err(invalid(path, "domain rule needs phrases or keywords"));
        }

        let mut confirmed_by = Vec::with_capacity(self.confirmed_by.len());
        for raw in &self.confirmed_by {
            let signal = raw
                .parse::<ContextSignal>()
                .map_err(|message| invalid(path, message))?;
            confirmed_by.push(signal);
        }

        let domain = match kind {
            RuleKind::Domain { domain } => Some(domain),
            RuleKind::Action { .. } => self.domain,
        };

        Ok(Rule {
            action: ActionId::new(action),
            kind,
            domain,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| self.action.trim().to_string()),
            phrases,
            keywords,
            weak_keywords,
            aliases,
            confirmed_by,
            resources: normalize_words(&self.resources),
            generic_member: self.generic_member,
            gated: self.gated,
            destructive: self.destructive,
        })
    }
}
