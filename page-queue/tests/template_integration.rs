//! Integration tests for page-queue template commands and create --template

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

fn stdout_line(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap().trim().to_string()
}

fn add_destination(config_path: &str) {
    page_queue(config_path)
        .args(["destination", "add", "1234567890", "--name", "Corner Bakery"])
        .args(["--token", "secret-page-token"])
        .assert()
        .success();
}

fn add_sale_template(config_path: &str) -> String {
    stdout_line(
        page_queue(config_path)
            .args(["template", "add", "Weekend sale"])
            .args(["--content", "30% off everything this weekend"])
            .args(["--image", "https://cdn.example.com/sale.jpg"])
            .args(["--image", "/uploads/banner.jpg"]),
    )
}

#[test]
fn test_template_add_and_list() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();
    let template_id = add_sale_template(&config_path);
    assert!(!template_id.is_empty());

    page_queue(&config_path)
        .args(["template", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "{} | Weekend sale | 30% off everything this weekend",
            template_id
        )));

    let output = page_queue(&config_path)
        .args(["template", "list", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let templates = json.as_array().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0]["id"], template_id.as_str());
    assert_eq!(
        templates[0]["images"],
        serde_json::json!([
            "https://cdn.example.com/sale.jpg",
            "https://bakery.example.com/uploads/banner.jpg"
        ])
    );
}

#[test]
fn test_template_empty_content_rejected() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    page_queue(&config_path)
        .args(["template", "add", "Blank", "--content", "  "])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Template name and content cannot be empty"));
}

#[test]
fn test_template_delete() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();
    let template_id = add_sale_template(&config_path);

    page_queue(&config_path)
        .args(["template", "delete", template_id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted template"));

    page_queue(&config_path)
        .args(["template", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    page_queue(&config_path)
        .args(["template", "delete", template_id.as_str()])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Not found"));
}

#[tokio::test]
async fn test_create_from_template_prefills_content_and_images() {
    let (_temp_dir, config_path, db_path) = setup_test_env();
    add_destination(&config_path);
    let template_id = add_sale_template(&config_path);

    let post_id = stdout_line(
        page_queue(&config_path)
            .args(["create", "--template", template_id.as_str()])
            .args(["--destination", "1234567890"])
            .args(["--image", "https://cdn.example.com/extra.jpg"])
            .args(["--schedule", "1h"]),
    );

    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.content, "30% off everything this weekend");
    assert_eq!(
        db.get_post_images(&post_id).await.unwrap(),
        vec![
            "https://cdn.example.com/sale.jpg".to_string(),
            "https://bakery.example.com/uploads/banner.jpg".to_string(),
            "https://cdn.example.com/extra.jpg".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_create_content_overrides_template_text() {
    let (_temp_dir, config_path, db_path) = setup_test_env();
    add_destination(&config_path);
    let template_id = add_sale_template(&config_path);

    let post_id = stdout_line(
        page_queue(&config_path)
            .args(["create", "Sale extended to Monday"])
            .args(["--template", template_id.as_str()])
            .args(["--destination", "1234567890"]),
    );

    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Draft);
    assert_eq!(post.content, "Sale extended to Monday");
    assert_eq!(db.get_post_images(&post_id).await.unwrap().len(), 2);

    // The post keeps its copy after the template is gone
    assert!(db.delete_template(&template_id).await.unwrap());
    assert!(db.get_post(&post_id).await.unwrap().is_some());
}

#[test]
fn test_create_with_unknown_template() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();
    add_destination(&config_path);

    page_queue(&config_path)
        .args(["create", "--template", "missing", "--destination", "1234567890"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_create_requires_content_or_template() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    page_queue(&config_path)
        .args(["create", "--destination", "1234567890"])
        .assert()
        .failure()
        .code(2);
}
