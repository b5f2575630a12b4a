//! # Core Ports
//!
//! Any backend adapter must implement these traits to be used by the
//! services layer. They describe the hosted service exactly as the client
//! consumes it: a one-shot snapshot query, a handful of engagement writes,
//! and a multiplexed change-stream subscription.

use async_trait::async_trait;
use uuid::Uuid;

use crate::change::{ChangeEvent, Relation};
use crate::error::Result;
use crate::models::{ArticleSnapshot, ArticleSummary, Comment, NewComment, NewReaction, Reaction};

/// Read and write contract against the hosted content service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// One-shot snapshot of an article plus every engagement row scoped to
    /// it. `Ok(None)` when the article does not exist.
    async fn article_snapshot(&self, article_id: Uuid) -> Result<Option<ArticleSnapshot>>;

    /// Paginated feed query, newest first.
    async fn list_articles(&self, limit: i64, offset: i64) -> Result<Vec<ArticleSummary>>;

    // Reaction writes
    async fn insert_reaction(&self, new: NewReaction) -> Result<Reaction>;
    async fn update_reaction(&self, id: Uuid, liked: bool) -> Result<Reaction>;
    async fn delete_reaction(&self, id: Uuid) -> Result<()>;

    /// Stores a comment; the returned row carries the server-assigned id and
    /// creation timestamp.
    async fn insert_comment(&self, new: NewComment) -> Result<Comment>;

    /// Server-side upsert-increment of the article's view counter. Returns
    /// the new authoritative count, or `None` when the service omits it.
    async fn bump_view_count(&self, article_id: Uuid) -> Result<Option<u64>>;
}

/// Change-notification contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Opens one multiplexed subscription covering `relations`. The
    /// transport filters by relation only; article scoping is up to the
    /// consumer.
    async fn subscribe(&self, relations: &[Relation]) -> Result<Box<dyn ChangeSubscription>>;
}

/// Live handle to an open subscription. Dropping it tears the stream down.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChangeSubscription: Send {
    /// Next event in delivery order; `None` once the feed is closed.
    async fn next_event(&mut self) -> Option<ChangeEvent>;
}
