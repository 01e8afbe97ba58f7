//! One pipeline run: scan, publish in parallel, commit

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::PublishingConfig;
use crate::db::PostStore;
use crate::error::Result;
use crate::pipeline::orchestrator::{publish, OrchestratorOptions};
use crate::pipeline::scanner::scan_due;
use crate::pipeline::transition::{commit, TransitionResult};
use crate::target::PublishTarget;
use crate::types::{PostRecord, PublishOutcome};

/// Counters for a single run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Due posts handed to the orchestrator
    pub attempted: usize,
    pub published: usize,
    pub failed: usize,
    /// Outcomes discarded because another run already transitioned the post
    pub skipped: usize,
    /// Outcomes that could not be written to the store
    pub persistence_errors: usize,
}

enum ItemResult {
    Committed(PublishOutcome, TransitionResult),
    PersistenceError,
}

pub struct PipelineRunner {
    store: Arc<dyn PostStore>,
    target: Arc<dyn PublishTarget>,
    max_concurrency: usize,
    options: OrchestratorOptions,
}

impl PipelineRunner {
    pub fn new(store: Arc<dyn PostStore>, target: Arc<dyn PublishTarget>) -> Self {
        Self {
            store,
            target,
            max_concurrency: crate::config::DEFAULT_MAX_CONCURRENCY,
            options: OrchestratorOptions::default(),
        }
    }

    pub fn from_config(
        store: Arc<dyn PostStore>,
        target: Arc<dyn PublishTarget>,
        config: &PublishingConfig,
    ) -> Self {
        Self::new(store, target)
            .with_max_concurrency(config.max_concurrency)
            .with_options(OrchestratorOptions {
                cleanup_staged_media: config.cleanup_staged_media,
            })
    }

    /// Upper bound on posts being published at once (at least 1)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Publish every post due at `now` and persist the results.
    ///
    /// Only a failing scan is an error. A single post failing, panicking, or
    /// failing to persist never affects the others; those cases are counted in
    /// the returned summary.
    pub async fn run_once(&self, now: i64) -> Result<RunSummary> {
        let due = scan_due(self.store.as_ref(), now).await?;
        let mut summary = RunSummary {
            attempted: due.len(),
            ..RunSummary::default()
        };

        if due.is_empty() {
            info!("No posts due");
            return Ok(summary);
        }

        info!(
            due = due.len(),
            max_concurrency = self.max_concurrency,
            target = self.target.name(),
            "Publishing due posts"
        );

        let results: Vec<ItemResult> = stream::iter(due)
            .map(|record| self.process(record, now))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                ItemResult::Committed(_, TransitionResult::Skipped) => summary.skipped += 1,
                ItemResult::Committed(PublishOutcome::Published { .. }, _) => {
                    summary.published += 1
                }
                ItemResult::Committed(PublishOutcome::Failed { .. }, _) => summary.failed += 1,
                ItemResult::PersistenceError => summary.persistence_errors += 1,
            }
        }

        info!(
            attempted = summary.attempted,
            published = summary.published,
            failed = summary.failed,
            skipped = summary.skipped,
            persistence_errors = summary.persistence_errors,
            "Run complete"
        );

        Ok(summary)
    }

    async fn process(&self, record: PostRecord, now: i64) -> ItemResult {
        let outcome = AssertUnwindSafe(publish(self.target.as_ref(), &record, &self.options))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                error!(post_id = %record.id(), "Publishing panicked: {}", reason);
                PublishOutcome::Failed {
                    reason: format!("Internal error while publishing: {}", reason),
                }
            });

        match commit(self.store.as_ref(), record.id(), &outcome, now).await {
            Ok(transition) => ItemResult::Committed(outcome, transition),
            Err(e) => {
                // The post stays scheduled and is picked up by the next run
                error!(post_id = %record.id(), "Failed to persist outcome: {}", e);
                if outcome.is_published() {
                    warn!(
                        post_id = %record.id(),
                        "Post is live but still recorded as scheduled"
                    );
                }
                ItemResult::PersistenceError
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
