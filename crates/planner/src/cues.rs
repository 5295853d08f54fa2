/// Ordering relation stated between two consecutive mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCue {
    /// "A then B", "A before B": A runs first.
    Forward,
    /// "A after B": B runs first.
    Reverse,
}

const FORWARD_WORDS: &[&str] = &["then", "before", "finally", "afterwards", "next"];
const REVERSE_WORDS: &[&str] = &["after", "once"];
const FORCE_WORDS: &[&str] = &["force", "--force", "-f", "forced", "forcefully", "force-push"];

/// First ordering cue in `between` (the tokens strictly between two mentions).
pub fn scan_cue(between: &[String]) -> Option<OrderCue> {
    between.iter().find_map(|token| {
        if FORWARD_WORDS.contains(&token.as_str()) {
            Some(OrderCue::Forward)
        } else if REVERSE_WORDS.contains(&token.as_str()) {
            Some(OrderCue::Reverse)
        } else {
            None
        }
    })
}

pub fn has_force_cue(tokens: &[String]) -> bool {
    tokens.iter().any(|token| FORCE_WORDS.contains(&token.as_str()))
}
