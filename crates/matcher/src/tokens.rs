/// Delimiter token emitted for `,`, `;`, `&` and `+`.
pub const LIST_DELIMITER: &str = ",";

const LEADING_PUNCT: &[char] = &['"', '\'', '`', '(', '[', '{', '<'];
const TRAILING_PUNCT: &[char] = &['"', '\'', '`', ')', ']', '}', '>', '.', '!', '?', ':'];

/// Words that never carry routing evidence and never count as a domain name.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "it", "its", "my", "our", "your", "me",
    "us", "we", "i", "you", "please", "can", "could", "would", "should", "will", "to", "of", "on",
    "at", "by", "is", "are", "be", "was", "some", "all", "any", "every", "now", "today", "asap",
    "code", "project", "repo", "repository", "codebase", "file", "files", "module", "app", "thing",
    "stuff", "production", "prod", "main", "branch", "here", "there", "again", "quickly", "up",
    "down", "so", "just", "also", "new", "old", "current", "latest", "local", "config",
];

/// Normalize free text into lowercase tokens.
///
/// Sequence delimiters (`,`, `;`, `&`, `+`) become standalone [`LIST_DELIMITER`] tokens so the
/// matcher can tell a list of requests ("fix, review, and commit") from one sentence. Path-like
/// tokens keep their inner punctuation.
pub fn normalize(text: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            ',' | ';' | '&' | '+' => {
                spaced.push(' ');
                spaced.push_str(LIST_DELIMITER);
                spaced.push(' ');
            }
            _ => spaced.extend(ch.to_lowercase()),
        }
    }

    spaced
        .split_whitespace()
        .filter_map(|raw| {
            if raw == LIST_DELIMITER {
                return Some(raw.to_string());
            }
            let trimmed = raw
                .trim_start_matches(LEADING_PUNCT)
                .trim_end_matches(TRAILING_PUNCT);
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

pub fn is_delimiter(token: &str) -> bool {
    token == LIST_DELIMITER || token == "and"
}

fn has_file_extension(token: &str) -> bool {
    let Some((stem, ext)) = token.rsplit_once('.') else {
        return false;
    };
    if stem.chars().count() < 2 || ext.is_empty() || ext.len() > 6 {
        return false;
    }
    ext.chars().all(|c| c.is_ascii_alphanumeric()) && ext.chars().any(|c| c.is_ascii_alphabetic())
}

/// Heuristic: does the token name a file or module path?
///
/// A leading slash alone (`/review`) reads as a slash command, not a path.
pub fn is_path_token(token: &str) -> bool {
    let command_like = token.starts_with('/') && token[1..].find(['/', '.']).is_none();
    if command_like {
        return false;
    }
    let has_sep = token.contains('/') || token.contains('\\');
    let has_colons = token.contains("::");
    has_sep || has_colons || has_file_extension(token)
}
