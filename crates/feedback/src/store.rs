use crate::error::{FeedbackError, Result};
use crate::record::{now_ms, FeedbackRecord, PendingDecision, RecordOutcome};
use crate::weights::{recompute, FeedbackPolicy, WeightSnapshot};
use fs2::FileExt;
use router_protocol::{ActionId, FeedbackIngest, FeedbackOutcome};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    schema_version: u32,
    #[serde(default)]
    records: Vec<FeedbackRecord>,
    #[serde(default)]
    pending: Vec<PendingDecision>,
}

struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Process-wide learning store.
///
/// Writers are serialized by one mutex (and, when persisted, an exclusive lock file so separate
/// processes sharing the file never interleave). Every write appends records, replays the log
/// and publishes a fresh [`WeightSnapshot`]; readers clone the current `Arc` and never observe a
/// half-applied write.
pub struct FeedbackStore {
    path: Option<PathBuf>,
    policy: FeedbackPolicy,
    state: Mutex<PersistedState>,
    snapshot: RwLock<Arc<WeightSnapshot>>,
}

impl FeedbackStore {
    pub fn in_memory(policy: FeedbackPolicy) -> Self {
        Self {
            path: None,
            policy,
            state: Mutex::new(PersistedState {
                schema_version: STORE_SCHEMA_VERSION,
                ..PersistedState::default()
            }),
            snapshot: RwLock::new(Arc::new(WeightSnapshot::default())),
        }
    }

    /// Open (or start) the store persisted at `path`. A corrupt file is set aside, not fatal.
    pub fn open(path: impl AsRef<Path>, policy: FeedbackPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = {
            let _lock = acquire_lock(&path)?;
            load_state(&path)
        };
        let snapshot = recompute(&state.records, &policy, 0);
        log::debug!(
            "feedback store {} loaded: {} records, {} pending",
            path.display(),
            state.records.len(),
            state.pending.len()
        );
        Ok(Self {
            path: Some(path),
            policy,
            state: Mutex::new(state),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn policy(&self) -> &FeedbackPolicy {
        &self.policy
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Latest committed weights. May lag a concurrent write.
    pub fn snapshot(&self) -> Arc<WeightSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.with_state(|state| state.records.clone())
    }

    pub fn pending(&self) -> Vec<PendingDecision> {
        self.with_state(|state| state.pending.clone())
    }

    /// Open the correction window for a routed decision. Registering twice is a no-op.
    pub fn register_decision(
        &self,
        decision_id: &str,
        actions: &[ActionId],
        fingerprint: &str,
    ) -> Result<()> {
        self.register_decision_at(decision_id, actions, fingerprint, now_ms())
    }

    pub fn register_decision_at(
        &self,
        decision_id: &str,
        actions: &[ActionId],
        fingerprint: &str,
        now_ms: u64,
    ) -> Result<()> {
        if actions.is_empty() {
            return Err(FeedbackError::InvalidFeedback(format!(
                "decision '{decision_id}' has no actions"
            )));
        }
        self.mutate(|state| {
            let known = state.pending.iter().any(|p| p.decision_id == decision_id)
                || state.records.iter().any(|r| r.decision_id == decision_id);
            if !known {
                state.pending.push(PendingDecision {
                    decision_id: decision_id.to_string(),
                    actions: actions.to_vec(),
                    fingerprint: fingerprint.to_string(),
                    registered_ms: now_ms,
                });
            }
            Ok(())
        })
    }

    pub fn ingest(&self, feedback: &FeedbackIngest) -> Result<()> {
        self.ingest_at(feedback, now_ms())
    }

    /// Apply explicit feedback for a decision still inside its window.
    pub fn ingest_at(&self, feedback: &FeedbackIngest, now_ms: u64) -> Result<()> {
        if feedback.outcome == FeedbackOutcome::Corrected && feedback.corrected_action.is_none() {
            return Err(FeedbackError::InvalidFeedback(
                "a correction needs corrected_action".to_string(),
            ));
        }

        self.mutate(|state| {
            let idx = state
                .pending
                .iter()
                .position(|p| p.decision_id == feedback.decision_id)
                .ok_or_else(|| FeedbackError::UnknownDecision(feedback.decision_id.clone()))?;
            let pending = state.pending.remove(idx);

            match feedback.outcome {
                FeedbackOutcome::Accepted => {
                    for action in &pending.actions {
                        state
                            .records
                            .push(record(&pending, action, RecordOutcome::Success, None, now_ms));
                    }
                }
                FeedbackOutcome::Corrected => {
                    // The primary action is the one the caller overrode.
                    let Some(wrong) = pending.actions.first() else {
                        return Err(FeedbackError::InvalidFeedback(format!(
                            "decision '{}' has no actions",
                            pending.decision_id
                        )));
                    };
                    if feedback.corrected_action.as_ref() == Some(wrong) {
                        state
                            .records
                            .push(record(&pending, wrong, RecordOutcome::Success, None, now_ms));
                    } else {
                        state.records.push(record(
                            &pending,
                            wrong,
                            RecordOutcome::Corrected,
                            feedback.corrected_action.clone(),
                            now_ms,
                        ));
                    }
                }
                FeedbackOutcome::Failed => {
                    for action in &pending.actions {
                        state
                            .records
                            .push(record(&pending, action, RecordOutcome::Failed, None, now_ms));
                    }
                }
            }
            log::info!(
                "feedback {:?} recorded for decision {}",
                feedback.outcome,
                pending.decision_id
            );
            Ok(())
        })
    }

    /// Record a dispatch failure. Unknown or already settled decisions are ignored.
    pub fn record_failure(&self, decision_id: &str) -> Result<()> {
        let feedback = FeedbackIngest {
            decision_id: decision_id.to_string(),
            outcome: FeedbackOutcome::Failed,
            corrected_action: None,
        };
        match self.ingest(&feedback) {
            Err(FeedbackError::UnknownDecision(id)) => {
                log::debug!("failure for settled or unknown decision {id} ignored");
                Ok(())
            }
            other => other,
        }
    }

    /// Close a decision without any record (cancelled before it could succeed or fail).
    /// Returns whether the decision was still pending.
    pub fn discard(&self, decision_id: &str) -> Result<bool> {
        self.mutate(|state| {
            let before = state.pending.len();
            state.pending.retain(|p| p.decision_id != decision_id);
            Ok(state.pending.len() != before)
        })
    }

    pub fn settle_expired(&self) -> Result<usize> {
        self.settle_expired_at(now_ms())
    }

    /// Turn every decision whose window has elapsed into a success. Returns how many settled.
    pub fn settle_expired_at(&self, now_ms: u64) -> Result<usize> {
        let window_ms = u64::try_from(self.policy.window.as_millis()).unwrap_or(u64::MAX);
        self.mutate(|state| {
            let (expired, open): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                .into_iter()
                .partition(|p| now_ms.saturating_sub(p.registered_ms) >= window_ms);
            state.pending = open;
            for pending in &expired {
                for action in &pending.actions {
                    state
                        .records
                        .push(record(pending, action, RecordOutcome::Success, None, now_ms));
                }
            }
            if !expired.is_empty() {
                log::debug!("settled {} decisions as implicit successes", expired.len());
            }
            Ok(expired.len())
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&PersistedState) -> R) -> R {
        match self.state.lock() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    /// Single write path: lock, reload from disk, apply, persist, republish.
    fn mutate<R>(&self, apply: impl FnOnce(&mut PersistedState) -> Result<R>) -> Result<R> {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let _file_lock = match &self.path {
            Some(path) => {
                let lock = acquire_lock(path)?;
                *guard = load_state(path);
                Some(lock)
            }
            None => None,
        };

        let mut next = guard.clone();
        let out = apply(&mut next)?;

        if let Some(path) = &self.path {
            save_state(path, &next)?;
        }
        *guard = next;

        let generation = self.snapshot().generation() + 1;
        let snapshot = Arc::new(recompute(&guard.records, &self.policy, generation));
        match self.snapshot.write() {
            Ok(mut slot) => *slot = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
        Ok(out)
    }
}

fn record(
    pending: &PendingDecision,
    action: &ActionId,
    outcome: RecordOutcome,
    corrected_action: Option<ActionId>,
    timestamp_ms: u64,
) -> FeedbackRecord {
    FeedbackRecord {
        decision_id: pending.decision_id.clone(),
        action: action.clone(),
        fingerprint: pending.fingerprint.clone(),
        outcome,
        corrected_action,
        timestamp_ms,
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "feedback".into());
    name.push(".lock");
    path.with_file_name(name)
}

fn acquire_lock(path: &Path) -> Result<StoreLock> {
    let lock_path = lock_path(path);
    if let Some(parent) = lock_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)?;
    file.lock_exclusive().map_err(|err| FeedbackError::Lock {
        path: lock_path.display().to_string(),
        message: err.to_string(),
    })?;
    Ok(StoreLock { file })
}

fn load_state(path: &Path) -> PersistedState {
    let fresh = PersistedState {
        schema_version: STORE_SCHEMA_VERSION,
        ..PersistedState::default()
    };
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return fresh,
        Err(err) => {
            log::warn!("feedback store {} unreadable: {err}", path.display());
            return fresh;
        }
    };
    match serde_json::from_str::<PersistedState>(&raw) {
        Ok(state) if state.schema_version == STORE_SCHEMA_VERSION => state,
        Ok(state) => {
            log::warn!(
                "feedback store {} has schema {} (expected {STORE_SCHEMA_VERSION}); starting empty",
                path.display(),
                state.schema_version
            );
            set_aside(path);
            fresh
        }
        Err(err) => {
            log::warn!("feedback store {} is corrupt ({err}); starting empty", path.display());
            set_aside(path);
            fresh
        }
    }
}

fn set_aside(path: &Path) {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "feedback".into());
    name.push(".corrupt");
    if let Err(err) = std::fs::rename(path, path.with_file_name(name)) {
        log::warn!("could not move aside {}: {err}", path.display());
    }
}

fn save_state(path: &Path, state: &PersistedState) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(state)?;
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("feedback"),
        std::process::id()
    ));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
