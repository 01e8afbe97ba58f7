//! Core types for Pagecast

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PagecastError;

/// Lifecycle state of a post.
///
/// `Draft` and `Scheduled` are set by authoring; `Published` and `Failed`
/// are terminal and only written by the publishing pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = PagecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(PagecastError::InvalidInput(format!(
                "Unknown post status '{}'. Valid options: draft, scheduled, published, failed",
                other
            ))),
        }
    }
}

/// A post row as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub destination_id: String,
    pub status: PostStatus,
    pub created_at: i64,
    pub scheduled_at: Option<i64>,
    pub published_at: Option<i64>,
    pub external_post_id: Option<String>,
    pub error_message: Option<String>,
}

impl Post {
    /// New draft for the given destination.
    pub fn new(content: String, destination_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            destination_id,
            status: PostStatus::Draft,
            created_at: chrono::Utc::now().timestamp(),
            scheduled_at: None,
            published_at: None,
            external_post_id: None,
            error_message: None,
        }
    }

    /// New post that becomes due at `scheduled_at`.
    pub fn scheduled(content: String, destination_id: String, scheduled_at: i64) -> Self {
        Self {
            status: PostStatus::Scheduled,
            scheduled_at: Some(scheduled_at),
            ..Self::new(content, destination_id)
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.status == PostStatus::Scheduled && self.scheduled_at.is_some_and(|at| at <= now)
    }
}

/// The external page a post is published to.
///
/// The access token is wrapped in a `SecretString` so it never shows up in
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct Destination {
    pub id: String,
    /// Page identifier on the external platform
    pub external_id: String,
    pub name: String,
    pub access_token: SecretString,
    pub created_at: i64,
}

impl Destination {
    pub fn new(external_id: String, name: String, access_token: SecretString) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            external_id,
            name,
            access_token,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// Saved post body used to pre-fill new posts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub content: String,
    pub created_at: i64,
}

impl Template {
    pub fn new(name: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            content,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// The unit of publishing work: a post with its ordered images and destination.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub post: Post,
    /// Absolute image URLs in publish order
    pub images: Vec<String>,
    pub destination: Destination,
}

impl PostRecord {
    pub fn id(&self) -> &str {
        &self.post.id
    }
}

/// Result of one publish attempt for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { external_post_id: String },
    Failed { reason: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// Fields written by a terminal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Published {
        external_post_id: String,
        published_at: i64,
    },
    Failed {
        error_message: String,
    },
}

impl StatusChange {
    pub fn from_outcome(outcome: &PublishOutcome, now: i64) -> Self {
        match outcome {
            PublishOutcome::Published { external_post_id } => StatusChange::Published {
                external_post_id: external_post_id.clone(),
                published_at: now,
            },
            PublishOutcome::Failed { reason } => StatusChange::Failed {
                error_message: reason.clone(),
            },
        }
    }

    pub fn target_status(&self) -> PostStatus {
        match self {
            StatusChange::Published { .. } => PostStatus::Published,
            StatusChange::Failed { .. } => PostStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_new_is_draft_with_uuid() {
        let post = Post::new("Hello".to_string(), "dest-1".to_string());

        let uuid = uuid::Uuid::parse_str(&post.id).unwrap();
        assert_eq!(uuid.get_version(), Some(uuid::Version::Random));
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.scheduled_at, None);
        assert_eq!(post.published_at, None);
        assert_eq!(post.external_post_id, None);
        assert_eq!(post.error_message, None);
    }

    #[test]
    fn test_post_scheduled_sets_time() {
        let post = Post::scheduled("Hello".to_string(), "dest-1".to_string(), 1_700_000_000);
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.scheduled_at, Some(1_700_000_000));
    }

    #[test]
    fn test_post_is_due() {
        let post = Post::scheduled("Hello".to_string(), "dest-1".to_string(), 100);
        assert!(post.is_due(100));
        assert!(post.is_due(101));
        assert!(!post.is_due(99));

        let draft = Post::new("Hello".to_string(), "dest-1".to_string());
        assert!(!draft.is_due(i64::MAX));
    }

    #[test]
    fn test_post_status_round_trip_strings() {
        for status in [
            PostStatus::Draft,
            PostStatus::Scheduled,
            PostStatus::Published,
            PostStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PostStatus>().unwrap(), status);
        }
        assert_eq!("SCHEDULED".parse::<PostStatus>().unwrap(), PostStatus::Scheduled);
    }

    #[test]
    fn test_post_status_parse_invalid() {
        let err = "pending".parse::<PostStatus>().unwrap_err();
        assert!(err.to_string().contains("Unknown post status 'pending'"));
    }

    #[test]
    fn test_post_status_serializes_lowercase() {
        let json = serde_json::to_string(&PostStatus::Published).unwrap();
        assert_eq!(json, r#""published""#);
    }

    #[test]
    fn test_terminal_states() {
        assert!(PostStatus::Published.is_terminal());
        assert!(PostStatus::Failed.is_terminal());
        assert!(!PostStatus::Draft.is_terminal());
        assert!(!PostStatus::Scheduled.is_terminal());
    }

    #[test]
    fn test_destination_debug_redacts_token() {
        let destination = Destination::new(
            "page_1".to_string(),
            "Coffee Shop".to_string(),
            SecretString::from("super-secret-token".to_string()),
        );
        let debug = format!("{:?}", destination);
        assert!(!debug.contains("super-secret-token"));
        assert_eq!(destination.token(), "super-secret-token");
    }

    #[test]
    fn test_status_change_from_outcome() {
        let published = StatusChange::from_outcome(
            &PublishOutcome::Published {
                external_post_id: "123".to_string(),
            },
            42,
        );
        assert_eq!(
            published,
            StatusChange::Published {
                external_post_id: "123".to_string(),
                published_at: 42
            }
        );
        assert_eq!(published.target_status(), PostStatus::Published);

        let failed = StatusChange::from_outcome(
            &PublishOutcome::Failed {
                reason: "boom".to_string(),
            },
            42,
        );
        assert_eq!(failed.target_status(), PostStatus::Failed);
    }
}
