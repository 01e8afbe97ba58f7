//! Integration tests for page-queue destination and create commands

use assert_cmd::Command;
use libpagecast::{Database, PostStatus};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Helper to create a test environment with config and database
fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("posts.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[publishing]
public_base_url = "https://bakery.example.com"
"#,
        escape_path_for_toml(&db_path.to_string_lossy())
    );
    fs::write(&config_path, config_content).unwrap();

    (
        temp_dir,
        config_path.to_string_lossy().to_string(),
        db_path.to_string_lossy().to_string(),
    )
}

fn page_queue(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("page-queue").unwrap();
    cmd.env("PAGECAST_CONFIG", config_path)
        .env_remove("PAGECAST_DB_PATH")
        .env_remove("PAGECAST_PAGE_TOKEN");
    cmd
}

fn add_destination(config_path: &str) -> String {
    let output = page_queue(config_path)
        .args(["destination", "add", "1234567890", "--name", "Corner Bakery"])
        .args(["--token", "secret-page-token"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).unwrap().trim().to_string()
}

fn stdout_line(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap().trim().to_string()
}

// DESTINATION TESTS

#[test]
fn test_destination_add_and_list_hides_token() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();
    let id = add_destination(&config_path);
    assert!(!id.is_empty());

    page_queue(&config_path)
        .args(["destination", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("Corner Bakery"))
        .stdout(predicate::str::contains("secret-page-token").not());

    page_queue(&config_path)
        .args(["destination", "list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""external_id":"1234567890""#))
        .stdout(predicate::str::contains("secret-page-token").not());
}

#[test]
fn test_destination_token_from_env() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    page_queue(&config_path)
        .env("PAGECAST_PAGE_TOKEN", "env-token")
        .args(["destination", "add", "555", "--name", "Env Page"])
        .assert()
        .success();
}

#[test]
fn test_duplicate_destination_rejected() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();
    add_destination(&config_path);

    page_queue(&config_path)
        .args(["destination", "add", "1234567890", "--name", "Again"])
        .args(["--token", "t"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("already registered"));
}

// CREATE TESTS

#[tokio::test]
async fn test_create_draft_without_schedule() {
    let (_temp_dir, config_path, db_path) = setup_test_env();
    add_destination(&config_path);

    let post_id = stdout_line(
        page_queue(&config_path).args(["create", "Fresh bread", "--destination", "1234567890"]),
    );

    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Draft);
    assert_eq!(post.scheduled_at, None);
}

#[tokio::test]
async fn test_create_scheduled_with_images_in_order() {
    let (_temp_dir, config_path, db_path) = setup_test_env();
    let destination_id = add_destination(&config_path);

    let post_id = stdout_line(
        page_queue(&config_path)
            .args(["create", "Gallery", "--destination", destination_id.as_str()])
            .args(["--image", "https://cdn.example.com/2.jpg"])
            .args(["--image", "/uploads/1.jpg"])
            .args(["--schedule", "2h"]),
    );

    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);

    let now = chrono::Utc::now().timestamp();
    let diff = post.scheduled_at.unwrap() - now;
    assert!((7100..=7200).contains(&diff), "expected ~2h, got {}s", diff);

    assert_eq!(
        db.get_post_images(&post_id).await.unwrap(),
        vec![
            "https://cdn.example.com/2.jpg".to_string(),
            "https://bakery.example.com/uploads/1.jpg".to_string(),
        ]
    );
}

#[test]
fn test_create_empty_content_rejected() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();
    add_destination(&config_path);

    page_queue(&config_path)
        .args(["create", "   ", "--destination", "1234567890"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Content cannot be empty"));
}

#[test]
fn test_create_unknown_destination() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    page_queue(&config_path)
        .args(["create", "Hello", "--destination", "nope"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_create_bad_schedule_rejected() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();
    add_destination(&config_path);

    page_queue(&config_path)
        .args(["create", "Hello", "--destination", "1234567890"])
        .args(["--schedule", "not a time"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_relative_image_without_base_url_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("posts.db");
    fs::write(
        &config_path,
        format!(
            "[database]\npath = \"{}\"\n",
            escape_path_for_toml(&db_path.to_string_lossy())
        ),
    )
    .unwrap();
    let config_path = config_path.to_string_lossy().to_string();
    add_destination(&config_path);

    page_queue(&config_path)
        .args(["create", "Hello", "--destination", "1234567890"])
        .args(["--image", "/uploads/a.jpg"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("public_base_url"));
}
