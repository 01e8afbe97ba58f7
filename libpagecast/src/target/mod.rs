//! Publish target abstraction
//!
//! A publish target is the external platform a page post ends up on. The
//! pipeline needs exactly two calls from it (stage one image, create one feed
//! entry) plus an optional cleanup call for staged media.
//!
//! Credentials travel with each call through the `Destination`, so one client
//! instance serves every page.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//! use libpagecast::target::{graph::GraphClient, PublishTarget};
//! use libpagecast::types::Destination;
//!
//! # async fn example(destination: Destination) -> Result<(), libpagecast::error::PublishError> {
//! let client = GraphClient::new("https://graph.facebook.com/v20.0", Duration::from_secs(30))?;
//!
//! let handle = client
//!     .upload_media(&destination, "https://cdn.example.com/a.jpg")
//!     .await?;
//! let post_id = client
//!     .create_feed_entry(&destination, "New menu!", &[handle])
//!     .await?;
//! println!("Published {}", post_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::PublishError;
use crate::types::Destination;

pub mod graph;

// Available outside tests so the binaries' integration tests can use it too
pub mod mock;

#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Stage one image without making it visible on the page.
    ///
    /// Returns the media handle used to attach it to a feed entry.
    async fn upload_media(
        &self,
        destination: &Destination,
        source_url: &str,
    ) -> Result<String, PublishError>;

    /// Create the visible feed entry, attaching staged media in the given order.
    ///
    /// `attachments` is empty for text-only posts. Returns the external post id.
    async fn create_feed_entry(
        &self,
        destination: &Destination,
        content: &str,
        attachments: &[String],
    ) -> Result<String, PublishError>;

    /// Remove a staged media item. Targets without cleanup support do nothing.
    async fn delete_media(
        &self,
        _destination: &Destination,
        _media_handle: &str,
    ) -> Result<(), PublishError> {
        Ok(())
    }

    /// Short identifier used in logs
    fn name(&self) -> &str;
}
