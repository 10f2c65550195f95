use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn commit_rag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("commit-rag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("app.json"),
        r#"[{"sha":"abc123","author":"alice","code":"print(1)","explanation":"add print","files edited":1}]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/commits.sqlite"

[ingest]
artifact_path = "{root}/data/app.json"

[retrieval]
top_k = 5

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("commit-rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_commit_rag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = commit_rag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run commit-rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_commit_rag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/commits.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_commit_rag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_commit_rag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_upsert_with_disabled_embeddings_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_commit_rag(&config_path, &["init"]);
    let (stdout, stderr, success) = run_commit_rag(&config_path, &["upsert"]);
    assert!(!success, "upsert should fail: stdout={}", stdout);
    assert!(
        stderr.contains("Embedding provider is disabled"),
        "stderr={}",
        stderr
    );
}

#[test]
fn test_stats_on_empty_database() {
    let (_tmp, config_path) = setup_test_env();

    run_commit_rag(&config_path, &["init"]);
    let (stdout, stderr, success) = run_commit_rag(&config_path, &["stats"]);
    assert!(success, "stats failed: stderr={}", stderr);
    assert!(stdout.contains("Commits:       0"));
    assert!(stdout.contains("Cleanliness:   n/a"));
}

#[test]
fn test_history_on_empty_log() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_commit_rag(&config_path, &["history"]);
    assert!(success, "history failed: stderr={}", stderr);
    assert!(stdout.contains("No questions answered yet."));
}

#[test]
fn test_ask_with_disabled_embeddings_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_commit_rag(&config_path, &["init"]);
    let (_, stderr, success) = run_commit_rag(&config_path, &["ask", "what did alice do?"]);
    assert!(!success);
    assert!(
        stderr.contains("Failed to generate embedding"),
        "stderr={}",
        stderr
    );
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, success) = run_commit_rag(&missing, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
