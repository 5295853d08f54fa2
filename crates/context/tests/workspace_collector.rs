use anyhow::Result;
use router_context::{capture_snapshot, ContextSource, Probe, WorkspaceCollector};
use std::time::Duration;

#[tokio::test]
async fn workspace_snapshot_reads_report_and_file_mix() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let root = temp.path();

    std::fs::create_dir_all(root.join("src"))?;
    std::fs::write(root.join("src/main.py"), "print('hi')\n")?;
    std::fs::write(root.join("src/util.py"), "\n")?;
    std::fs::create_dir_all(root.join(".router"))?;
    std::fs::write(
        root.join(".router/diagnostics.json"),
        r#"{"type_errors": 4, "lint_warnings": 1}"#,
    )?;

    let collector = WorkspaceCollector::new(root);
    let snapshot = capture_snapshot(&collector, "fix types", None, Duration::from_secs(5)).await;

    let counts = snapshot
        .diagnostics
        .value()
        .expect("diagnostics report should be read");
    assert_eq!(counts.type_errors, 4);
    assert_eq!(counts.test_failures, 0);

    let mix = snapshot.file_mix.value().expect("file walk should succeed");
    assert_eq!(mix.count("py"), 2);
    // hidden report directory is not part of the mix
    assert_eq!(mix.count("json"), 0);

    Ok(())
}

#[tokio::test]
async fn missing_report_marks_diagnostics_unavailable() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let collector = WorkspaceCollector::new(temp.path());
    let snapshot = capture_snapshot(&collector, "review", None, Duration::from_secs(5)).await;

    assert!(matches!(snapshot.diagnostics, Probe::Unavailable { .. }));
    assert!(snapshot
        .unavailable_sources()
        .contains(&ContextSource::Diagnostics));
    Ok(())
}
