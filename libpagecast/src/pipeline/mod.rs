//! Post publishing pipeline
//!
//! One run is a two-phase protocol per due post:
//!
//! 1. **Orchestrate** ([`orchestrator::publish`]): talk to the publish target and
//!    produce a [`PublishOutcome`](crate::types::PublishOutcome). No store writes
//!    happen here.
//! 2. **Commit** ([`transition::commit`]): write the terminal state with a
//!    status-guarded update, so overlapping runs never transition a post twice.
//!
//! [`PipelineRunner`] ties the scan, both phases and the concurrency bound
//! together.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libpagecast::pipeline::PipelineRunner;
//! use libpagecast::target::graph::GraphClient;
//! use libpagecast::{Config, Database};
//!
//! # async fn example() -> libpagecast::Result<()> {
//! let config = Config::load()?;
//! let db = Database::new(&config.database.path).await?;
//! let client = GraphClient::from_config(&config.publishing)?;
//!
//! let runner = PipelineRunner::from_config(Arc::new(db), Arc::new(client), &config.publishing);
//! let summary = runner.run_once(chrono::Utc::now().timestamp()).await?;
//! println!("published {} of {}", summary.published, summary.attempted);
//! # Ok(())
//! # }
//! ```

pub mod orchestrator;
pub mod runner;
pub mod scanner;
pub mod transition;

pub use orchestrator::{publish, OrchestratorOptions};
pub use runner::{PipelineRunner, RunSummary};
pub use scanner::scan_due;
pub use transition::{commit, TransitionResult};
