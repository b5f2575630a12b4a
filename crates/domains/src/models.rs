//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Press.
//! We use UUID v7 for time-ordered, globally unique identification.
//! Every row is owned and made durable by the hosted service; this crate
//! only describes their shape at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A published news item.
///
/// Immutable from the engagement side: fetched once per page view and never
/// patched by the change stream (editorial changes go through the admin
/// surface, which is a different client).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Ordered tag names, as curated by the editor
    pub tags: Vec<String>,
    /// Ordered picture URLs served by the hosted file storage
    pub pictures: Vec<String>,
}

/// Feed row: what the paginated index needs, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    /// First picture of the article, if any
    pub lead_picture: Option<String>,
}

/// Insert payload for publishing an article (server assigns id and timestamp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub pictures: Vec<String>,
}

/// Like/dislike polarity of a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    /// The stored representation is a plain boolean column.
    pub fn from_liked(liked: bool) -> Self {
        if liked {
            Polarity::Like
        } else {
            Polarity::Dislike
        }
    }

    pub fn is_like(self) -> bool {
        matches!(self, Polarity::Like)
    }
}

/// A like/dislike record tied to one article.
///
/// `user_id` is nullable: anonymous legacy rows carry no owner. At most one
/// reaction per (article, authenticated user) pair is an application-level
/// invariant enforced by client logic, not by storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub article_id: Uuid,
    pub user_id: Option<Uuid>,
    pub liked: bool,
}

impl Reaction {
    pub fn polarity(&self) -> Polarity {
        Polarity::from_liked(self.liked)
    }
}

/// Insert payload for a reaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReaction {
    pub article_id: Uuid,
    pub user_id: Option<Uuid>,
    pub liked: bool,
}

/// A reader comment. Append-mostly; edits and deletes arrive as change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub article_id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a comment (server assigns id and timestamp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub article_id: Uuid,
    pub author: String,
    pub body: String,
}

/// Per-article view tally, keyed by article id.
///
/// Updated through a server-side upsert-increment; clients never
/// read-modify-write it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewCounter {
    pub article_id: Uuid,
    pub count: u64,
}

/// One-shot snapshot query result: the article plus every engagement row
/// currently scoped to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSnapshot {
    pub article: Article,
    pub comments: Vec<Comment>,
    pub reactions: Vec<Reaction>,
    pub view_count: u64,
}

impl ArticleSnapshot {
    pub fn article_id(&self) -> Uuid {
        self.article.id
    }
}
