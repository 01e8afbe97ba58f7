//! Selection of due posts

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::db::PostStore;
use crate::error::Result;
use crate::types::PostRecord;

/// Every `scheduled` record whose `scheduled_at` is at or before `now`.
///
/// Read-only. Records the store returns that are not actually due, or that
/// appear twice, are dropped so a run never handles a post more than once.
/// Callers must not rely on the order of the result.
pub async fn scan_due<S: PostStore + ?Sized>(store: &S, now: i64) -> Result<Vec<PostRecord>> {
    let candidates = store.due_posts(now).await?;
    let returned = candidates.len();

    let mut seen = HashSet::with_capacity(returned);
    let due: Vec<PostRecord> = candidates
        .into_iter()
        .filter(|record| record.post.is_due(now))
        .filter(|record| seen.insert(record.post.id.clone()))
        .collect();

    if due.len() != returned {
        warn!(
            returned,
            kept = due.len(),
            "Store returned posts that are not due or duplicated; ignoring them"
        );
    }
    debug!(now, due = due.len(), "Scanned for due posts");

    Ok(due)
}
