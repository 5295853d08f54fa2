use regex::Regex;
use router_protocol::Urgency;
use std::sync::OnceLock;

struct UrgencyPatterns {
    critical: Regex,
    high: Regex,
    low: Regex,
}

fn patterns() -> Option<&'static UrgencyPatterns> {
    static PATTERNS: OnceLock<Option<UrgencyPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let build = |raw: &str| Regex::new(raw).map_err(|err| log::warn!("urgency pattern: {err}"));
            Some(UrgencyPatterns {
                critical: build(
                    r"(?i)\b(urgent|urgently|asap|emergency|outage|critical|hotfix|sev-?[01]|(prod|production)\s+(is\s+)?down)\b",
                )
                .ok()?,
                high: build(r"(?i)\b(important|soon|quickly|blocker|blocking|high priority)\b").ok()?,
                low: build(
                    r"(?i)\b(when you have time|whenever|eventually|low priority|nice to have|no rush)\b",
                )
                .ok()?,
            })
        })
        .as_ref()
}

/// Classify request phrasing. Critical wording wins over high, high over low.
pub fn detect_urgency(text: &str) -> Urgency {
    let Some(patterns) = patterns() else {
        return Urgency::Normal;
    };
    if patterns.critical.is_match(text) {
        Urgency::Critical
    } else if patterns.high.is_match(text) {
        Urgency::High
    } else if patterns.low.is_match(text) {
        Urgency::Low
    } else {
        Urgency::Normal
    }
}

/// An explicit override from the caller always beats the phrasing.
pub fn resolve_urgency(text: &str, explicit: Option<Urgency>) -> Urgency {
    explicit.unwrap_or_else(|| detect_urgency(text))
}
