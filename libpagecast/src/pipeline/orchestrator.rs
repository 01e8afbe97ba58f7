//! Publish protocol for a single post
//!
//! Text-only posts are a single feed-entry call. Posts with images stage every
//! image first, in stored order, and only then create the feed entry with the
//! staged handles attached in the same order. The first failed upload aborts
//! the attempt: no further uploads, no feed entry. A post therefore either
//! appears on the page with all of its images or not at all.

use tracing::{debug, warn};

use crate::error::PublishError;
use crate::target::PublishTarget;
use crate::types::{PostRecord, PublishOutcome};

#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Best-effort delete of already-staged media when an attempt fails
    pub cleanup_staged_media: bool,
}

/// Run the publish protocol for one due record.
///
/// Never returns an error: every failure becomes `PublishOutcome::Failed`
/// with a human-readable reason.
pub async fn publish<T: PublishTarget + ?Sized>(
    target: &T,
    record: &PostRecord,
    options: &OrchestratorOptions,
) -> PublishOutcome {
    match try_publish(target, record, options).await {
        Ok(external_post_id) => PublishOutcome::Published { external_post_id },
        Err(e) => PublishOutcome::Failed {
            reason: e.to_string(),
        },
    }
}

async fn try_publish<T: PublishTarget + ?Sized>(
    target: &T,
    record: &PostRecord,
    options: &OrchestratorOptions,
) -> Result<String, PublishError> {
    validate(record)?;

    let destination = &record.destination;
    let content = &record.post.content;

    if record.images.is_empty() {
        debug!(post_id = %record.post.id, target = target.name(), "Publishing text post");
        return target.create_feed_entry(destination, content, &[]).await;
    }

    let total = record.images.len();
    let mut handles = Vec::with_capacity(total);

    for (index, source_url) in record.images.iter().enumerate() {
        debug!(
            post_id = %record.post.id,
            image = index + 1,
            total,
            "Staging image"
        );
        match target.upload_media(destination, source_url).await {
            Ok(handle) => handles.push(handle),
            Err(source) => {
                if options.cleanup_staged_media {
                    cleanup_staged(target, record, &handles).await;
                }
                return Err(PublishError::PartialUpload {
                    position: index + 1,
                    total,
                    source: Box::new(source),
                });
            }
        }
    }

    match target.create_feed_entry(destination, content, &handles).await {
        Ok(id) => Ok(id),
        Err(e) => {
            // Only a definite rejection proves the entry was not created
            if options.cleanup_staged_media && matches!(e, PublishError::Api { .. }) {
                cleanup_staged(target, record, &handles).await;
            } else if options.cleanup_staged_media {
                warn!(
                    post_id = %record.post.id,
                    staged = handles.len(),
                    "Feed entry state unknown, keeping staged media: {}",
                    e
                );
            }
            Err(e)
        }
    }
}

/// Checks that make a network call pointless.
fn validate(record: &PostRecord) -> Result<(), PublishError> {
    if record.post.content.trim().is_empty() {
        return Err(PublishError::Validation("post content is empty".to_string()));
    }

    if record.destination.external_id.trim().is_empty() {
        return Err(PublishError::Validation(
            "destination has no external page id".to_string(),
        ));
    }

    for (index, source_url) in record.images.iter().enumerate() {
        let absolute = url::Url::parse(source_url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !absolute {
            return Err(PublishError::Validation(format!(
                "image {} is not an absolute http(s) URL: {}",
                index + 1,
                source_url
            )));
        }
    }

    Ok(())
}

async fn cleanup_staged<T: PublishTarget + ?Sized>(
    target: &T,
    record: &PostRecord,
    handles: &[String],
) {
    for handle in handles {
        if let Err(e) = target.delete_media(&record.destination, handle).await {
            warn!(
                post_id = %record.post.id,
                media = %handle,
                "Failed to delete staged media: {}",
                e
            );
        }
    }
}
