use crate::collector::ContextCollector;
use crate::error::{ContextError, Result};
use crate::snapshot::{DiagnosticCounts, FileTypeMix, GitState};
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_FILES: usize = 5_000;
const DEFAULT_DIAGNOSTICS_REPORT: &str = ".router/diagnostics.json";

/// Collector backed by the working tree: `git status`, a bounded file walk and an optional
/// diagnostics report written by the editor or CI (`{"type_errors": 3, ...}`).
#[derive(Debug, Clone)]
pub struct WorkspaceCollector {
    root: PathBuf,
    diagnostics_report: Option<PathBuf>,
    max_files: usize,
}

impl WorkspaceCollector {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            diagnostics_report: None,
            max_files: DEFAULT_MAX_FILES,
        }
    }

    pub fn with_diagnostics_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.diagnostics_report = Some(path.into());
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn report_path(&self) -> PathBuf {
        self.diagnostics_report
            .clone()
            .unwrap_or_else(|| self.root.join(DEFAULT_DIAGNOSTICS_REPORT))
    }
}

#[async_trait]
impl ContextCollector for WorkspaceCollector {
    async fn git_status(&self) -> Result<GitState> {
        let output = tokio::process::Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .arg("status")
            .arg("--porcelain=v1")
            .arg("-b")
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContextError::Git(stderr.trim().to_string()));
        }
        Ok(parse_porcelain(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn diagnostics(&self) -> Result<DiagnosticCounts> {
        let path = self.report_path();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ContextError::Unavailable("diagnostics"));
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn file_type_mix(&self) -> Result<FileTypeMix> {
        let root = self.root.clone();
        let max_files = self.max_files;
        tokio::task::spawn_blocking(move || walk_file_types(&root, max_files))
            .await
            .map_err(|err| ContextError::IoError(std::io::Error::other(err)))?
    }
}

/// Reduce `git status --porcelain=v1 -b` output to one state.
/// Conflict outranks local modifications, which outrank unpushed commits.
pub fn parse_porcelain(output: &str) -> GitState {
    let mut ahead = false;
    let mut modified = false;
    let mut conflict = false;

    for line in output.lines() {
        if let Some(branch) = line.strip_prefix("## ") {
            ahead = branch.contains("[ahead ") || branch.contains(", ahead ");
            continue;
        }
        let Some(code) = line.get(..2) else {
            continue;
        };
        if matches!(code, "UU" | "AA" | "DD" | "AU" | "UA" | "DU" | "UD") {
            conflict = true;
        } else if !code.trim().is_empty() {
            modified = true;
        }
    }

    if conflict {
        GitState::Conflict
    } else if modified {
        GitState::Modified
    } else if ahead {
        GitState::Ahead
    } else {
        GitState::Clean
    }
}

fn walk_file_types(root: &Path, max_files: usize) -> Result<FileTypeMix> {
    if !root.is_dir() {
        return Err(ContextError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        )));
    }

    let mut mix = FileTypeMix::new();
    let mut seen = 0usize;
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true);

    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if let Some(ext) = entry.path().extension().and_then(|ext| ext.to_str()) {
            mix.add(ext, 1);
        }
        seen += 1;
        if seen >= max_files {
            log::debug!("file walk stopped at {max_files} files");
            break;
        }
    }
    Ok(mix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn porcelain_states() {
        assert_eq!(parse_porcelain("## main...origin/main\n"), GitState::Clean);
        assert_eq!(
            parse_porcelain("## main...origin/main [ahead 2]\n"),
            GitState::Ahead
        );
        assert_eq!(
            parse_porcelain("## main...origin/main [ahead 1]\n M src/lib.rs\n"),
            GitState::Modified
        );
        assert_eq!(
            parse_porcelain("## main\n?? notes.txt\nUU src/lib.rs\n"),
            GitState::Conflict
        );
        assert_eq!(
            parse_porcelain("## main...origin/main [behind 3]\n"),
            GitState::Clean
        );
    }

    #[test]
    fn walk_counts_extensions_and_respects_limit() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/a.ts"), "").unwrap();
        std::fs::write(temp.path().join("src/b.TS"), "").unwrap();
        std::fs::write(temp.path().join("README.md"), "").unwrap();
        std::fs::write(temp.path().join("Makefile"), "").unwrap();

        let mix = walk_file_types(temp.path(), 100).unwrap();
        assert_eq!(mix.count("ts"), 2);
        assert_eq!(mix.count("md"), 1);
        assert_eq!(mix.dominant(), Some("ts"));

        let limited = walk_file_types(temp.path(), 1).unwrap();
        assert!(limited.total() <= 1);
    }
}
