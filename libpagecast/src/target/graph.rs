//! Graph API publish target
//!
//! Talks to a Graph-style HTTP API over JSON:
//!
//! - `POST {base}/{page}/photos` with `published: false` stages an image
//! - `POST {base}/{page}/feed` creates the post, optionally with `attached_media`
//! - `DELETE {base}/{media}` removes a staged image
//!
//! Error bodies look like `{"error": {"message": "...", "type": "...", "code": 4}}`;
//! the provider message is surfaced verbatim so it ends up in the post's
//! stored error message.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::PublishingConfig;
use crate::error::{PublishError, Result};
use crate::target::PublishTarget;
use crate::types::Destination;

#[derive(Clone, Debug)]
pub struct GraphClient {
    http: Client,
    base_url: String,
    api_root: Url,
}

#[derive(Serialize)]
struct PhotoUpload<'a> {
    url: &'a str,
    published: bool,
    access_token: &'a str,
}

#[derive(Serialize)]
struct FeedEntry<'a> {
    message: &'a str,
    access_token: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attached_media: Vec<AttachedMedia<'a>>,
}

#[derive(Serialize)]
struct AttachedMedia<'a> {
    media_fbid: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<i64>,
}

impl GraphClient {
    /// Build a client with a per-request timeout.
    ///
    /// A timed out request surfaces as `PublishError::Transport`.
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, PublishError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let api_root = Url::parse(&base_url)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| {
                PublishError::Validation(format!("invalid API base URL '{}'", base_url))
            })?;

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_root,
        })
    }

    pub fn from_config(config: &PublishingConfig) -> Result<Self> {
        Ok(Self::new(&config.api_base_url, config.request_timeout())?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append path segments to the API root, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
        operation: &str,
    ) -> std::result::Result<String, PublishError> {
        debug!(operation, url = %url, "Graph API request");

        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        debug!(operation, status, "Graph API response");
        parse_graph_response(status, &text, operation)
    }
}

#[async_trait]
impl PublishTarget for GraphClient {
    async fn upload_media(
        &self,
        destination: &Destination,
        source_url: &str,
    ) -> std::result::Result<String, PublishError> {
        let url = self.endpoint(&[&destination.external_id, "photos"]);
        let body = PhotoUpload {
            url: source_url,
            published: false,
            access_token: destination.token(),
        };
        self.post_json(url, &body, "upload photo").await
    }

    async fn create_feed_entry(
        &self,
        destination: &Destination,
        content: &str,
        attachments: &[String],
    ) -> std::result::Result<String, PublishError> {
        let url = self.endpoint(&[&destination.external_id, "feed"]);
        let body = FeedEntry {
            message: content,
            access_token: destination.token(),
            attached_media: attachments
                .iter()
                .map(|handle| AttachedMedia { media_fbid: handle })
                .collect(),
        };
        let operation = if attachments.is_empty() {
            "publish text post"
        } else {
            "publish multi-photo post"
        };
        self.post_json(url, &body, operation).await
    }

    async fn delete_media(
        &self,
        destination: &Destination,
        media_handle: &str,
    ) -> std::result::Result<(), PublishError> {
        let url = self.endpoint(&[media_handle]);
        debug!(url = %url, "Graph API delete staged media");

        let resp = self
            .http
            .delete(url)
            .query(&[("access_token", destination.token())])
            .send()
            .await?;
        let status = resp.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        Err(error_from_body(status, &text, "delete staged photo"))
    }

    fn name(&self) -> &str {
        "graph"
    }
}

/// Turn a Graph API response into the created object's id or a `PublishError`.
fn parse_graph_response(
    status: u16,
    body: &str,
    operation: &str,
) -> std::result::Result<String, PublishError> {
    if !(200..300).contains(&status) {
        return Err(error_from_body(status, body, operation));
    }

    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        PublishError::MalformedResponse(format!("{}: invalid JSON: {}", operation, e))
    })?;

    // Ids are documented as strings but some endpoints return numbers
    match value.get("id") {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(PublishError::MalformedResponse(format!(
            "{}: response has no id",
            operation
        ))),
    }
}

fn error_from_body(status: u16, body: &str, operation: &str) -> PublishError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error:
                ErrorBody {
                    message: Some(message),
                    kind,
                    code,
                },
        }) => {
            debug!(status, ?kind, ?code, "Graph API error");
            PublishError::Api { status, message }
        }
        _ => PublishError::Transport(format!("Failed to {} (HTTP {})", operation, status)),
    }
}
