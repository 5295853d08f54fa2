use router_matcher::ContextSignal;
use router_protocol::Urgency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Share of workspace files an extension needs before `file_type:<ext>` counts as present.
pub const FILE_TYPE_SHARE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitState {
    Clean,
    Modified,
    Ahead,
    Conflict,
    #[default]
    Unknown,
}

impl GitState {
    pub fn as_str(self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Modified => "modified",
            GitState::Ahead => "ahead",
            GitState::Conflict => "conflict",
            GitState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticCounts {
    pub type_errors: u32,
    pub test_failures: u32,
    pub lint_warnings: u32,
}

impl DiagnosticCounts {
    pub fn total(&self) -> u64 {
        u64::from(self.type_errors) + u64::from(self.test_failures) + u64::from(self.lint_warnings)
    }

    fn nonzero_kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.type_errors > 0 {
            kinds.push("type");
        }
        if self.test_failures > 0 {
            kinds.push("test");
        }
        if self.lint_warnings > 0 {
            kinds.push("lint");
        }
        kinds
    }
}

/// File counts per lowercase extension (without the dot).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u64>", into = "BTreeMap<String, u64>")]
pub struct FileTypeMix {
    counts: BTreeMap<String, u64>,
}

impl FileTypeMix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ext: &str, count: u64) {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() || count == 0 {
            return;
        }
        *self.counts.entry(ext).or_insert(0) += count;
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count(&self, ext: &str) -> u64 {
        self.counts.get(ext).copied().unwrap_or(0)
    }

    pub fn share(&self, ext: &str) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(ext) as f64 / total as f64
    }

    /// Most common extension; alphabetical order breaks ties.
    pub fn dominant(&self) -> Option<&str> {
        self.counts
            .iter()
            .fold(None, |best: Option<(&String, u64)>, (ext, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((ext, *count)),
            })
            .map(|(ext, _)| ext.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(ext, count)| (ext.as_str(), *count))
    }
}

impl<S: AsRef<str>> FromIterator<(S, u64)> for FileTypeMix {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut mix = FileTypeMix::new();
        for (ext, count) in iter {
            mix.add(ext.as_ref(), count);
        }
        mix
    }
}

impl From<BTreeMap<String, u64>> for FileTypeMix {
    fn from(counts: BTreeMap<String, u64>) -> Self {
        counts.into_iter().collect()
    }
}

impl From<FileTypeMix> for BTreeMap<String, u64> {
    fn from(mix: FileTypeMix) -> Self {
        mix.counts
    }
}

/// Result of one context probe. A failed or timed-out probe is recorded, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Probe<T> {
    Available { value: T },
    Unavailable { reason: String },
}

impl<T> Probe<T> {
    pub fn available(value: T) -> Self {
        Probe::Available { value }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Probe::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Probe::Available { value } => Some(value),
            Probe::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Probe::Available { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Git,
    Diagnostics,
    FileMix,
}

impl ContextSource {
    pub const ALL: [ContextSource; 3] = [
        ContextSource::Git,
        ContextSource::Diagnostics,
        ContextSource::FileMix,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContextSource::Git => "git",
            ContextSource::Diagnostics => "diagnostics",
            ContextSource::FileMix => "file_mix",
        }
    }
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository state captured once per session. Immutable after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub git: Probe<GitState>,
    pub diagnostics: Probe<DiagnosticCounts>,
    pub file_mix: Probe<FileTypeMix>,
    pub urgency: Urgency,
}

impl ContextSnapshot {
    /// Snapshot where every source answered.
    pub fn complete(
        git: GitState,
        diagnostics: DiagnosticCounts,
        file_mix: FileTypeMix,
        urgency: Urgency,
    ) -> Self {
        Self {
            git: Probe::available(git),
            diagnostics: Probe::available(diagnostics),
            file_mix: Probe::available(file_mix),
            urgency,
        }
    }

    /// Snapshot where no source answered.
    pub fn empty(urgency: Urgency) -> Self {
        Self {
            git: Probe::unavailable("not collected"),
            diagnostics: Probe::unavailable("not collected"),
            file_mix: Probe::unavailable("not collected"),
            urgency,
        }
    }

    pub fn is_available(&self, source: ContextSource) -> bool {
        match source {
            ContextSource::Git => self.git.is_available(),
            ContextSource::Diagnostics => self.diagnostics.is_available(),
            ContextSource::FileMix => self.file_mix.is_available(),
        }
    }

    pub fn unavailable_sources(&self) -> Vec<ContextSource> {
        ContextSource::ALL
            .into_iter()
            .filter(|source| !self.is_available(*source))
            .collect()
    }

    /// Coarse learning key: `git=<state>;diag=<nonzero kinds>;mix=<dominant ext>`.
    pub fn fingerprint(&self) -> String {
        let git = self.git.value().map_or("unavailable", |state| state.as_str());
        let diag = match self.diagnostics.value() {
            None => "unavailable".to_string(),
            Some(counts) => {
                let kinds = counts.nonzero_kinds();
                if kinds.is_empty() {
                    "none".to_string()
                } else {
                    kinds.join("+")
                }
            }
        };
        let mix = match self.file_mix.value() {
            None => "unavailable",
            Some(mix) => mix.dominant().unwrap_or("none"),
        };
        format!("git={git};diag={diag};mix={mix}")
    }

    pub fn source_of(signal: &ContextSignal) -> ContextSource {
        if signal.is_diagnostic() {
            ContextSource::Diagnostics
        } else if signal.is_git() {
            ContextSource::Git
        } else {
            ContextSource::FileMix
        }
    }

    /// `Some(true)` when the signal is present, `Some(false)` when its source answered without
    /// it, `None` when the source is unavailable.
    pub fn signal(&self, signal: &ContextSignal) -> Option<bool> {
        match signal {
            ContextSignal::TypeErrors => self.diagnostics.value().map(|d| d.type_errors > 0),
            ContextSignal::TestFailures => self.diagnostics.value().map(|d| d.test_failures > 0),
            ContextSignal::LintWarnings => self.diagnostics.value().map(|d| d.lint_warnings > 0),
            ContextSignal::UncommittedChanges => self
                .git
                .value()
                .map(|g| matches!(g, GitState::Modified | GitState::Conflict)),
            ContextSignal::UnpushedCommits => self.git.value().map(|g| *g == GitState::Ahead),
            ContextSignal::MergeConflict => self.git.value().map(|g| *g == GitState::Conflict),
            ContextSignal::FileType(ext) => self
                .file_mix
                .value()
                .map(|mix| mix.share(ext) >= FILE_TYPE_SHARE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mix() -> FileTypeMix {
        [("ts", 30), ("json", 5), ("md", 5)].into_iter().collect()
    }

    #[test]
    fn fingerprint_lists_nonzero_diagnostics() {
        let snapshot = ContextSnapshot::complete(
            GitState::Modified,
            DiagnosticCounts {
                type_errors: 5,
                test_failures: 0,
                lint_warnings: 2,
            },
            mix(),
            Urgency::Normal,
        );
        assert_eq!(snapshot.fingerprint(), "git=modified;diag=type+lint;mix=ts");
    }

    #[test]
    fn file_mix_from_json_is_normalized() {
        let mix: FileTypeMix = serde_json::from_str(r#"{"TS": 5, ".Rs": 2, "md": 0}"#).unwrap();
        assert_eq!(mix.count("ts"), 5);
        assert_eq!(mix.count("rs"), 2);
        assert_eq!(mix.count("md"), 0);
        assert_eq!(serde_json::to_string(&mix).unwrap(), r#"{"rs":2,"ts":5}"#);
    }

    #[test]
    fn fingerprint_marks_missing_sources() {
        let snapshot = ContextSnapshot::empty(Urgency::Low);
        assert_eq!(
            snapshot.fingerprint(),
            "git=unavailable;diag=unavailable;mix=unavailable"
        );
        assert_eq!(snapshot.unavailable_sources(), ContextSource::ALL.to_vec());
    }

    #[test]
    fn signals_follow_their_source() {
        let mut snapshot = ContextSnapshot::complete(
            GitState::Ahead,
            DiagnosticCounts::default(),
            mix(),
            Urgency::Normal,
        );
        assert_eq!(snapshot.signal(&ContextSignal::UnpushedCommits), Some(true));
        assert_eq!(snapshot.signal(&ContextSignal::UncommittedChanges), Some(false));
        assert_eq!(snapshot.signal(&ContextSignal::TypeErrors), Some(false));
        assert_eq!(
            snapshot.signal(&ContextSignal::FileType("ts".to_string())),
            Some(true)
        );
        assert_eq!(
            snapshot.signal(&ContextSignal::FileType("md".to_string())),
            Some(false)
        );

        snapshot.diagnostics = Probe::unavailable("timed out");
        assert_eq!(snapshot.signal(&ContextSignal::TypeErrors), None);
    }

    #[test]
    fn dominant_prefers_alphabetical_on_ties() {
        let mix: FileTypeMix = [("rs", 3), ("py", 3)].into_iter().collect();
        assert_eq!(mix.dominant(), Some("py"));
        assert_eq!(FileTypeMix::new().dominant(), None);
    }

    #[test]
    fn probe_wire_format() {
        let probe: Probe<GitState> = Probe::available(GitState::Clean);
        let json = serde_json::to_value(&probe).unwrap();
        assert_eq!(json, serde_json::json!({"status": "available", "value": "clean"}));
    }
}
