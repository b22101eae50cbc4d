use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn convert(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("convert-to-markdown").expect("binary exists");
    cmd.current_dir(workdir.path())
        .env_remove("SKILLKIT_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    convert(&dir)
        .arg("does-not-exist.docx")
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found: does-not-exist.docx"));
}

#[test]
fn unknown_mode_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    convert(&dir)
        .args(["report.pdf", "--mode", "fast"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown extraction mode 'fast'"));
}

#[cfg(unix)]
#[test]
fn converts_with_configured_markitdown() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("fake-markitdown");
    std::fs::write(&fake, "#!/bin/sh\necho \"# Quarterly report\"\n").unwrap();
    std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = dir.path().join("skillkit.yaml");
    std::fs::write(
        &config,
        format!("binaries:\n  markitdown: {}\n", fake.display()),
    )
    .unwrap();

    let input = dir.path().join("report.docx");
    std::fs::write(&input, b"PK\x03\x04").unwrap();

    convert(&dir)
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Converted to:"))
        .stdout(predicate::str::contains("report.md"));

    let markdown = std::fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert_eq!(markdown.trim(), "# Quarterly report");
}

#[cfg(unix)]
#[test]
fn every_backend_failing_reports_failed_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("skillkit.yaml");
    std::fs::write(
        &config,
        "binaries:\n  markitdown: /nonexistent/markitdown\n  pandoc: /nonexistent/pandoc\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("slides.pptx"), b"PK\x03\x04").unwrap();

    convert(&dir)
        .args(["slides.pptx", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to convert slides.pptx"));
}
