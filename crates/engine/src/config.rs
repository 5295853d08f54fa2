use anyhow::{Context, Result};
use router_feedback::FeedbackPolicy;
use router_protocol::Urgency;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "ROUTER_CONFIG";
pub const RULES_ENV: &str = "ROUTER_RULES";

const DEFAULT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_MAX_CANDIDATES: usize = 3;

/// Auto-resolve thresholds per urgency level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub critical: f32,
    pub high: f32,
    pub normal: f32,
    pub low: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical: 0.3,
            high: 0.45,
            normal: 0.6,
            low: 0.75,
        }
    }
}

impl Thresholds {
    pub fn for_urgency(&self, urgency: Urgency) -> f32 {
        match urgency {
            Urgency::Critical => self.critical,
            Urgency::High => self.high,
            Urgency::Normal => self.normal,
            Urgency::Low => self.low,
        }
    }
}

/// Deltas of the scoring adjustments, in application order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringDeltas {
    pub exact_keyword_match: f32,
    pub context_confirms_intent: f32,
    pub explicit_file_path: f32,
    pub domain_clearly_stated: f32,
    pub generic_request: f32,
    pub ambiguous_multi_interpretation: f32,
    pub conflicting_signals: f32,
    pub missing_context_source: f32,
    pub unrecognized_domain: f32,
}

impl Default for ScoringDeltas {
    fn default() -> Self {
        Self {
            exact_keyword_match: 0.5,
            context_confirms_intent: 0.3,
            explicit_file_path: 0.2,
            domain_clearly_stated: 0.3,
            generic_request: -0.3,
            ambiguous_multi_interpretation: -0.4,
            conflicting_signals: -0.3,
            missing_context_source: -0.2,
            unrecognized_domain: -0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    pub thresholds: Thresholds,
    pub context_timeout: Duration,
    pub scoring: ScoringDeltas,
    pub feedback: FeedbackPolicy,
    /// How many candidates a clarification offers (2 or 3).
    pub max_candidates: usize,
    /// Rule table replacing the built-in one.
    pub rules: Option<PathBuf>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            context_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            scoring: ScoringDeltas::default(),
            feedback: FeedbackPolicy::default(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            rules: None,
        }
    }
}

impl RouterConfig {
    /// Load from `path`, else from `$ROUTER_CONFIG`, else defaults. `$ROUTER_RULES` overrides the
    /// rule table path in every case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        if let Some(rules) = std::env::var_os(RULES_ENV) {
            config.rules = Some(PathBuf::from(rules));
        }
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read router config {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("invalid router config {}", path.display()))?;
        // Relative rule paths are relative to the config file.
        if let (Some(rules), Some(dir)) = (config.rules.as_ref(), path.parent()) {
            if rules.is_relative() {
                config.rules = Some(dir.join(rules));
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(raw).context("parse router config")?;
        raw.validate()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    thresholds: RawThresholds,
    #[serde(default)]
    context: RawContext,
    #[serde(default)]
    scoring: RawScoring,
    #[serde(default)]
    feedback: RawFeedback,
    #[serde(default)]
    clarification: RawClarification,
    #[serde(default)]
    rules: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThresholds {
    critical: Option<f32>,
    high: Option<f32>,
    normal: Option<f32>,
    low: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContext {
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScoring {
    exact_keyword_match: Option<f32>,
    context_confirms_intent: Option<f32>,
    explicit_file_path: Option<f32>,
    domain_clearly_stated: Option<f32>,
    generic_request: Option<f32>,
    ambiguous_multi_interpretation: Option<f32>,
    conflicting_signals: Option<f32>,
    missing_context_source: Option<f32>,
    unrecognized_domain: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeedback {
    success_step: Option<f32>,
    correction_step: Option<f32>,
    cap: Option<f32>,
    window_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClarification {
    max_candidates: Option<usize>,
}

impl RawConfig {
    fn validate(self) -> Result<RouterConfig> {
        let defaults = RouterConfig::default();

        let t = defaults.thresholds;
        let thresholds = Thresholds {
            critical: self.thresholds.critical.unwrap_or(t.critical),
            high: self.thresholds.high.unwrap_or(t.high),
            normal: self.thresholds.normal.unwrap_or(t.normal),
            low: self.thresholds.low.unwrap_or(t.low),
        };
        let ordered = [
            thresholds.critical,
            thresholds.high,
            thresholds.normal,
            thresholds.low,
        ];
        if ordered.iter().any(|v| !(0.0..=1.0).contains(v)) {
            anyhow::bail!("thresholds must lie in [0, 1]");
        }
        if ordered.windows(2).any(|pair| pair[0] > pair[1]) {
            anyhow::bail!("thresholds must not decrease from critical to low");
        }

        let timeout_ms = self.context.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            anyhow::bail!("context.timeout_ms must be positive");
        }

        let d = defaults.scoring;
        let s = self.scoring;
        let scoring = ScoringDeltas {
            exact_keyword_match: s.exact_keyword_match.unwrap_or(d.exact_keyword_match),
            context_confirms_intent: s.context_confirms_intent.unwrap_or(d.context_confirms_intent),
            explicit_file_path: s.explicit_file_path.unwrap_or(d.explicit_file_path),
            domain_clearly_stated: s.domain_clearly_stated.unwrap_or(d.domain_clearly_stated),
            generic_request: s.generic_request.unwrap_or(d.generic_request),
            ambiguous_multi_interpretation: s
                .ambiguous_multi_interpretation
                .unwrap_or(d.ambiguous_multi_interpretation),
            conflicting_signals: s.conflicting_signals.unwrap_or(d.conflicting_signals),
            missing_context_source: s.missing_context_source.unwrap_or(d.missing_context_source),
            unrecognized_domain: s.unrecognized_domain.unwrap_or(d.unrecognized_domain),
        };
        let boosters = [
            scoring.exact_keyword_match,
            scoring.context_confirms_intent,
            scoring.explicit_file_path,
            scoring.domain_clearly_stated,
        ];
        let reducers = [
            scoring.generic_request,
            scoring.ambiguous_multi_interpretation,
            scoring.conflicting_signals,
            scoring.missing_context_source,
            scoring.unrecognized_domain,
        ];
        if boosters.iter().any(|v| !(0.0..=1.0).contains(v)) {
            anyhow::bail!("booster deltas must lie in [0, 1]");
        }
        if reducers.iter().any(|v| !(-1.0..=0.0).contains(v)) {
            anyhow::bail!("reducer deltas must lie in [-1, 0]");
        }

        let f = defaults.feedback;
        let feedback = FeedbackPolicy {
            success_step: self.feedback.success_step.unwrap_or(f.success_step),
            correction_step: self.feedback.correction_step.unwrap_or(f.correction_step),
            cap: self.feedback.cap.unwrap_or(f.cap),
            window: self
                .feedback
                .window_secs
                .map(Duration::from_secs)
                .unwrap_or(f.window),
        };
        if !(feedback.cap > 0.0 && feedback.cap <= 0.2) {
            anyhow::bail!("feedback.cap must lie in (0, 0.2]");
        }
        if feedback.success_step < 0.0 || feedback.correction_step < 0.0 {
            anyhow::bail!("feedback steps must not be negative");
        }

        let max_candidates = self
            .clarification
            .max_candidates
            .unwrap_or(DEFAULT_MAX_CANDIDATES);
        if !(2..=3).contains(&max_candidates) {
            anyhow::bail!("clarification.max_candidates must be 2 or 3");
        }

        Ok(RouterConfig {
            thresholds,
            context_timeout: Duration::from_millis(timeout_ms),
            scoring,
            feedback,
            max_candidates,
            rules: self.rules,
        })
    }
}
