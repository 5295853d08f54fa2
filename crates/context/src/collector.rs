use crate::error::{ContextError, Result};
use crate::snapshot::{ContextSnapshot, ContextSource, DiagnosticCounts, FileTypeMix, GitState, Probe};
use crate::urgency::{detect_urgency, resolve_urgency};
use async_trait::async_trait;
use router_protocol::Urgency;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Narrow view of the repository the router is working in.
///
/// Implementations may fail or hang; [`capture_snapshot`] bounds every call and folds failures
/// into [`Probe::Unavailable`], so an error here never aborts routing.
#[async_trait]
pub trait ContextCollector: Send + Sync {
    async fn git_status(&self) -> Result<GitState>;

    async fn diagnostics(&self) -> Result<DiagnosticCounts>;

    async fn file_type_mix(&self) -> Result<FileTypeMix>;

    fn detect_urgency(&self, text: &str) -> Urgency {
        detect_urgency(text)
    }
}

/// Query every source concurrently, each under its own timeout, and freeze the answers.
pub async fn capture_snapshot(
    collector: &dyn ContextCollector,
    text: &str,
    urgency_override: Option<Urgency>,
    timeout: Duration,
) -> ContextSnapshot {
    let (git, diagnostics, file_mix) = tokio::join!(
        probe(ContextSource::Git, timeout, collector.git_status()),
        probe(ContextSource::Diagnostics, timeout, collector.diagnostics()),
        probe(ContextSource::FileMix, timeout, collector.file_type_mix()),
    );

    let urgency = match urgency_override {
        Some(explicit) => resolve_urgency(text, Some(explicit)),
        None => collector.detect_urgency(text),
    };

    let snapshot = ContextSnapshot {
        git,
        diagnostics,
        file_mix,
        urgency,
    };
    log::debug!(
        "context snapshot {} (urgency={})",
        snapshot.fingerprint(),
        urgency.as_str()
    );
    snapshot
}

async fn probe<T, F>(source: ContextSource, timeout: Duration, fut: F) -> Probe<T>
where
    F: Future<Output = Result<T>>,
{
    let outcome = match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ContextError::Timeout {
            source_name: source.as_str(),
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    };
    match outcome {
        Ok(value) => Probe::available(value),
        Err(err) => {
            log::warn!("context source {source} unavailable: {err}");
            Probe::unavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticCollector;

    #[tokio::test]
    async fn slow_source_becomes_unavailable() {
        let collector = StaticCollector::new()
            .with_git(GitState::Clean)
            .with_diagnostics(DiagnosticCounts::default())
            .with_delay(ContextSource::Diagnostics, Duration::from_millis(500));

        let snapshot =
            capture_snapshot(&collector, "fix it", None, Duration::from_millis(25)).await;

        assert_eq!(snapshot.git, Probe::available(GitState::Clean));
        assert!(!snapshot.diagnostics.is_available());
        match &snapshot.diagnostics {
            Probe::Unavailable { reason } => assert!(reason.contains("timed out"), "{reason}"),
            Probe::Available { .. } => unreachable!(),
        }
        // never configured
        assert!(!snapshot.file_mix.is_available());
    }

    #[tokio::test]
    async fn urgency_override_beats_phrasing() {
        let collector = StaticCollector::new();
        let snapshot = capture_snapshot(
            &collector,
            "URGENT production down",
            Some(Urgency::Normal),
            DEFAULT_PROBE_TIMEOUT,
        )
        .await;
        assert_eq!(snapshot.urgency, Urgency::Normal);

        let detected =
            capture_snapshot(&collector, "URGENT production down", None, DEFAULT_PROBE_TIMEOUT)
                .await;
        assert_eq!(detected.urgency, Urgency::Critical);
    }
}
