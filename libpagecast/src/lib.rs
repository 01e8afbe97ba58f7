//! Pagecast - scheduled publishing to social pages
//!
//! This library holds the post store, the publish targets and the pipeline
//! that moves due posts from `scheduled` to `published` or `failed`. The
//! `page-send` and `page-queue` binaries are thin shells around it.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod scheduling;
pub mod target;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::{Database, PostStore};
pub use error::{PagecastError, PublishError, Result};
pub use pipeline::{PipelineRunner, RunSummary};
pub use target::PublishTarget;
pub use types::{Destination, Post, PostRecord, PostStatus, PublishOutcome, Template};
