//! Terminal state transitions

use tracing::{debug, info, warn};

use crate::db::PostStore;
use crate::error::Result;
use crate::types::{PostStatus, PublishOutcome, StatusChange};

/// Whether a commit actually changed the stored post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    Applied,
    /// The post was no longer `scheduled` (another run got there first)
    Skipped,
}

/// Persist an outcome as a `scheduled -> published|failed` transition.
///
/// The write is conditional on the post still being `scheduled`, so at most
/// one commit per post ever applies.
pub async fn commit<S: PostStore + ?Sized>(
    store: &S,
    post_id: &str,
    outcome: &PublishOutcome,
    now: i64,
) -> Result<TransitionResult> {
    let change = StatusChange::from_outcome(outcome, now);
    let target = change.target_status();

    let applied = store
        .update_if_status(post_id, PostStatus::Scheduled, &change)
        .await?;

    if !applied {
        warn!(
            post_id,
            target = %target,
            "Post was no longer scheduled; transition skipped"
        );
        return Ok(TransitionResult::Skipped);
    }

    match &change {
        StatusChange::Published {
            external_post_id, ..
        } => info!(post_id, external_post_id = %external_post_id, "Post published"),
        StatusChange::Failed { error_message } => {
            warn!(post_id, error = %error_message, "Post marked failed")
        }
    }
    debug!(post_id, status = %target, "Transition applied");

    Ok(TransitionResult::Applied)
}
