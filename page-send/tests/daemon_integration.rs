//! Integration tests for page-send daemon

use assert_cmd::Command;
use libpagecast::{Database, Destination, Post, PostStatus};
use predicates::prelude::*;
use secrecy::SecretString;
use std::fs;
use tempfile::TempDir;

/// Setup test environment with config and database
///
/// The Graph API base URL points at a port nothing listens on, so every
/// publish attempt is a transport failure and no test touches the network.
async fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[publishing]
api_base_url = "http://127.0.0.1:9"
request_timeout_secs = 2
max_concurrency = 2

[daemon]
poll_interval = 1
"#,
        db_path.display().to_string().replace('\\', "/")
    );

    fs::write(&config_path, config_content).unwrap();

    // Initialize database
    let _db = Database::new(db_path.to_str().unwrap()).await.unwrap();

    (
        temp_dir,
        config_path.to_str().unwrap().to_string(),
        db_path.to_str().unwrap().to_string(),
    )
}

async fn create_destination(db: &Database) -> Destination {
    if let Some(existing) = db.get_destination("1234567890").await.unwrap() {
        return existing;
    }

    let destination = Destination::new(
        "1234567890".to_string(),
        "Corner Bakery".to_string(),
        SecretString::from("page-token".to_string()),
    );
    db.create_destination(&destination).await.unwrap();
    destination
}

/// Create a scheduled post that is due for publishing
async fn create_due_post(db_path: &str, images: &[&str]) -> String {
    let db = Database::new(db_path).await.unwrap();
    let destination = create_destination(&db).await;
    let now = chrono::Utc::now().timestamp();

    let post = Post::scheduled(
        "Fresh bread today".to_string(),
        destination.id.clone(),
        now - 10,
    );
    let images: Vec<String> = images.iter().map(|s| s.to_string()).collect();
    db.create_post(&post, &images).await.unwrap();
    post.id
}

fn summary_from(stdout: &[u8]) -> serde_json::Value {
    serde_json::from_slice(stdout).expect("stdout should be a JSON summary")
}

fn page_send(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("page-send").unwrap();
    cmd.env("PAGECAST_CONFIG", config_path)
        .env_remove("PAGECAST_DB_PATH")
        .env_remove("RUST_LOG");
    cmd
}

// BASIC FUNCTIONALITY TESTS

#[tokio::test]
async fn test_once_with_nothing_due() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let output = page_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("No posts due"))
        .get_output()
        .stdout
        .clone();

    let summary = summary_from(&output);
    assert_eq!(summary["attempted"], 0);
    assert_eq!(summary["published"], 0);
    assert_eq!(summary["failed"], 0);
}

#[tokio::test]
async fn test_verbose_logging() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    page_send(&config_path)
        .arg("--once")
        .arg("--verbose")
        .assert()
        .success()
        .stderr(predicate::str::contains("Scanned for due posts"));
}

#[tokio::test]
async fn test_json_log_format() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    page_send(&config_path)
        .env("PAGECAST_LOG_FORMAT", "json")
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains(r#""message":"No posts due""#));
}

// POST PROCESSING TESTS

#[tokio::test]
async fn test_unreachable_platform_marks_post_failed() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    let post_id = create_due_post(&db_path, &[]).await;

    let output = page_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary = summary_from(&output);
    assert_eq!(summary["attempted"], 1);
    assert_eq!(summary["failed"], 1);

    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert!(post
        .error_message
        .unwrap()
        .starts_with("Transport failure"));
    assert_eq!(post.external_post_id, None);
}

#[tokio::test]
async fn test_failed_post_not_retried_on_next_run() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    let post_id = create_due_post(&db_path, &["https://cdn.example.com/bread.jpg"]).await;

    page_send(&config_path).arg("--once").assert().success();

    let output = page_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(summary_from(&output)["attempted"], 0);

    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert!(post
        .error_message
        .unwrap()
        .contains("Upload of image 1 of 1 failed"));
}

#[tokio::test]
async fn test_processes_multiple_due_posts() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    for _ in 0..3 {
        create_due_post(&db_path, &[]).await;
    }

    let output = page_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("Publishing due posts"))
        .get_output()
        .stdout
        .clone();

    let summary = summary_from(&output);
    assert_eq!(summary["attempted"], 3);
    assert_eq!(summary["failed"], 3);
    assert_eq!(summary["persistence_errors"], 0);
}

// ERROR HANDLING TESTS

#[tokio::test]
async fn test_invalid_config_exits_with_code_2() {
    let temp_dir = TempDir::new().unwrap();
    let invalid_config = temp_dir.path().join("invalid.toml");
    fs::write(&invalid_config, "invalid toml content [[[").unwrap();

    page_send(invalid_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[tokio::test]
async fn test_zero_concurrency_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");
    fs::write(
        &config_path,
        format!(
            "[database]\npath = \"{}\"\n\n[publishing]\nmax_concurrency = 0\n",
            db_path.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    page_send(config_path.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("max_concurrency"));
}

#[test]
fn test_help_mentions_once() {
    Command::cargo_bin("page-send")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--once"))
        .stdout(predicate::str::contains("--poll-interval"));
}
