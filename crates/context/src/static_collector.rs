use crate::collector::ContextCollector;
use crate::error::{ContextError, Result};
use crate::snapshot::{ContextSource, DiagnosticCounts, FileTypeMix, GitState};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Collector that answers from fixed values. Sources left unset report unavailable.
///
/// Loadable from JSON, e.g. `{"git": "modified", "diagnostics": {"type_errors": 5}}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticCollector {
    #[serde(default)]
    git: Option<GitState>,
    #[serde(default)]
    diagnostics: Option<DiagnosticCounts>,
    #[serde(default)]
    file_mix: Option<FileTypeMix>,
    #[serde(skip)]
    delays: HashMap<ContextSource, Duration>,
}

impl StaticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn with_git(mut self, state: GitState) -> Self {
        self.git = Some(state);
        self
    }

    pub fn with_diagnostics(mut self, counts: DiagnosticCounts) -> Self {
        self.diagnostics = Some(counts);
        self
    }

    pub fn with_file_mix(mut self, mix: FileTypeMix) -> Self {
        self.file_mix = Some(mix);
        self
    }

    /// Make one source answer late, to exercise probe timeouts.
    pub fn with_delay(mut self, source: ContextSource, delay: Duration) -> Self {
        self.delays.insert(source, delay);
        self
    }

    async fn answer<T: Clone>(&self, source: ContextSource, value: &Option<T>) -> Result<T> {
        if let Some(delay) = self.delays.get(&source) {
            tokio::time::sleep(*delay).await;
        }
        value
            .clone()
            .ok_or(ContextError::Unavailable(source.as_str()))
    }
}

#[async_trait]
impl ContextCollector for StaticCollector {
    async fn git_status(&self) -> Result<GitState> {
        self.answer(ContextSource::Git, &self.git).await
    }

    async fn diagnostics(&self) -> Result<DiagnosticCounts> {
        self.answer(ContextSource::Diagnostics, &self.diagnostics)
            .await
    }

    async fn file_type_mix(&self) -> Result<FileTypeMix> {
        self.answer(ContextSource::FileMix, &self.file_mix).await
    }
}
