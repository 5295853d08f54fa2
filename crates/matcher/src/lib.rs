//! # Router Matcher
//!
//! Turns a free-text developer request into scored intent candidates.
//!
//! ## Architecture
//!
//! ```text
//! request text
//!     │
//!     ├──> tokens::normalize
//!     │      ├─ lowercase, strip edge punctuation
//!     │      └─ list delimiters become "," tokens
//!     │
//!     ├──> PatternMatcher (RuleTable)
//!     │      ├─ phrases  -> Phrase evidence
//!     │      ├─ keywords -> Strong evidence
//!     │      ├─ weak keywords, family words, one-edit typos -> Weak evidence
//!     │      └─ explicit names, family mentions, paths, unknown technology
//!     │
//!     └──> Suggester (only when nothing usable matched)
//!            └─ edit distance + fuzzy action ids, generic fallback
//! ```
//!
//! The rule table is data: the built-in one is compiled in from `rules/default.toml` and can be
//! replaced at runtime with [`RuleTable::from_path`].

mod error;
mod matcher;
mod rules;
mod suggest;
pub mod tokens;

pub use error::{MatcherError, Result};
pub use matcher::{Evidence, FamilyMention, IntentCandidate, MatchReport, Mention, PatternMatcher};
pub use rules::{
    ActionVerb, BaseScores, ContextSignal, Domain, Family, Rule, RuleCategory, RuleKind, RuleTable,
};
pub use suggest::Suggester;
