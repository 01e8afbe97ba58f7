//! Scripted publish target for tests
//!
//! Records every call it receives, can be told to fail specific uploads or
//! feed entries, and tracks how many calls were in flight at once so tests
//! can check the pipeline's concurrency bound.
//!
//! Media handles are derived from the source URL (`media:<url>`), which makes
//! attachment order easy to assert on.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PublishError;
use crate::target::PublishTarget;
use crate::types::Destination;

/// One recorded call against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCall {
    UploadMedia {
        destination: String,
        source_url: String,
    },
    CreateFeedEntry {
        destination: String,
        content: String,
        attachments: Vec<String>,
    },
    DeleteMedia {
        destination: String,
        media_handle: String,
    },
}

#[derive(Default)]
struct Script {
    upload_failures: HashMap<String, PublishError>,
    feed_failures: HashMap<String, PublishError>,
    feed_ids: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct MockTarget {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<TargetCall>>>,
    delay: Duration,
    next_id: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockTarget {
    /// A target on which every call succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Uploading `source_url` fails with a provider message
    pub fn fail_upload(self, source_url: &str, message: &str) -> Self {
        self.fail_upload_with(
            source_url,
            PublishError::Api {
                status: 400,
                message: message.to_string(),
            },
        )
    }

    pub fn fail_upload_with(self, source_url: &str, error: PublishError) -> Self {
        self.script
            .lock()
            .unwrap()
            .upload_failures
            .insert(source_url.to_string(), error);
        self
    }

    /// Creating a feed entry with this exact content fails
    pub fn fail_feed(self, content: &str, message: &str) -> Self {
        self.fail_feed_with(
            content,
            PublishError::Api {
                status: 400,
                message: message.to_string(),
            },
        )
    }

    pub fn fail_feed_with(self, content: &str, error: PublishError) -> Self {
        self.script
            .lock()
            .unwrap()
            .feed_failures
            .insert(content.to_string(), error);
        self
    }

    /// Feed entries with this content get a fixed external id
    pub fn with_feed_id(self, content: &str, external_id: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .feed_ids
            .insert(content.to_string(), external_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<TargetCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upload_calls(&self) -> Vec<TargetCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, TargetCall::UploadMedia { .. }))
            .collect()
    }

    pub fn feed_calls(&self) -> Vec<TargetCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, TargetCall::CreateFeedEntry { .. }))
            .collect()
    }

    pub fn delete_calls(&self) -> Vec<TargetCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, TargetCall::DeleteMedia { .. }))
            .collect()
    }

    /// Highest number of calls observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn handle_for(source_url: &str) -> String {
        format!("media:{}", source_url)
    }

    async fn enter(&self, call: TargetCall) {
        self.calls.lock().unwrap().push(call);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PublishTarget for MockTarget {
    async fn upload_media(
        &self,
        destination: &Destination,
        source_url: &str,
    ) -> Result<String, PublishError> {
        self.enter(TargetCall::UploadMedia {
            destination: destination.external_id.clone(),
            source_url: source_url.to_string(),
        })
        .await;

        let failure = self
            .script
            .lock()
            .unwrap()
            .upload_failures
            .get(source_url)
            .cloned();
        self.leave();

        match failure {
            Some(error) => Err(error),
            None => Ok(Self::handle_for(source_url)),
        }
    }

    async fn create_feed_entry(
        &self,
        destination: &Destination,
        content: &str,
        attachments: &[String],
    ) -> Result<String, PublishError> {
        self.enter(TargetCall::CreateFeedEntry {
            destination: destination.external_id.clone(),
            content: content.to_string(),
            attachments: attachments.to_vec(),
        })
        .await;

        let (failure, fixed_id) = {
            let script = self.script.lock().unwrap();
            (
                script.feed_failures.get(content).cloned(),
                script.feed_ids.get(content).cloned(),
            )
        };
        self.leave();

        if let Some(error) = failure {
            return Err(error);
        }
        Ok(fixed_id.unwrap_or_else(|| {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{}_{}", destination.external_id, n)
        }))
    }

    async fn delete_media(
        &self,
        destination: &Destination,
        media_handle: &str,
    ) -> Result<(), PublishError> {
        self.enter(TargetCall::DeleteMedia {
            destination: destination.external_id.clone(),
            media_handle: media_handle.to_string(),
        })
        .await;
        self.leave();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
