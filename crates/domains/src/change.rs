//! # Change Events
//!
//! Wire shape of the hosted change-notification stream. One multiplexed
//! subscription covers up to three relations; every delivered event carries
//! an event kind plus the row payloads that kind guarantees, and nothing
//! else. Bulk-clear (relation truncate) carries no per-row detail at all.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Comment, Reaction, ViewCounter};

/// The streamed relations. Subscriptions filter by relation only; the
/// transport cannot combine that with per-article equality filters, so
/// article scoping happens on the consumer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Reactions,
    Comments,
    Views,
}

/// All three relations, the usual subscription set for an article page.
pub const ALL_RELATIONS: [Relation; 3] = [Relation::Reactions, Relation::Comments, Relation::Views];

/// A single row-level change on one relation.
///
/// Update rows may or may not include the before image depending on how the
/// relation is configured upstream, hence the `Option`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowChange<T> {
    Insert { new: T },
    Update { new: T, old: Option<T> },
    Delete { old: T },
    /// All rows in the relation were removed at once. No payload.
    Truncate,
}

/// Rows that are scoped to one article.
pub trait ArticleScoped {
    fn article_id(&self) -> Uuid;
}

impl ArticleScoped for Reaction {
    fn article_id(&self) -> Uuid {
        self.article_id
    }
}

impl ArticleScoped for Comment {
    fn article_id(&self) -> Uuid {
        self.article_id
    }
}

impl ArticleScoped for ViewCounter {
    fn article_id(&self) -> Uuid {
        self.article_id
    }
}

impl<T: ArticleScoped> RowChange<T> {
    /// The article the changed row belongs to. `None` for truncate, which
    /// affects the whole relation and names no row.
    pub fn article_id(&self) -> Option<Uuid> {
        match self {
            RowChange::Insert { new } | RowChange::Update { new, .. } => Some(new.article_id()),
            RowChange::Delete { old } => Some(old.article_id()),
            RowChange::Truncate => None,
        }
    }
}

/// One event off the multiplexed stream, tagged with its source relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "relation", content = "change", rename_all = "snake_case")]
pub enum ChangeEvent {
    Reactions(RowChange<Reaction>),
    Comments(RowChange<Comment>),
    Views(RowChange<ViewCounter>),
}

impl ChangeEvent {
    pub fn relation(&self) -> Relation {
        match self {
            ChangeEvent::Reactions(_) => Relation::Reactions,
            ChangeEvent::Comments(_) => Relation::Comments,
            ChangeEvent::Views(_) => Relation::Views,
        }
    }

    /// The article the event is scoped to, when it names a row.
    pub fn article_id(&self) -> Option<Uuid> {
        match self {
            ChangeEvent::Reactions(change) => change.article_id(),
            ChangeEvent::Comments(change) => change.article_id(),
            ChangeEvent::Views(change) => change.article_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_comment(article_id: Uuid) -> Comment {
        Comment {
            id: Uuid::now_v7(),
            article_id,
            author: "ada".to_string(),
            body: "first!".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_serialization_tags() {
        let article_id = Uuid::now_v7();
        let event = ChangeEvent::Comments(RowChange::Insert {
            new: sample_comment(article_id),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"relation\":\"comments\""));
        assert!(json.contains("\"kind\":\"insert\""));
        assert!(json.contains("first!"));

        let parsed: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.relation(), Relation::Comments);
        assert_eq!(parsed.article_id(), Some(article_id));
    }

    #[test]
    fn test_truncate_carries_no_row() {
        let event = ChangeEvent::Reactions(RowChange::Truncate);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"truncate\""));
        assert!(!json.contains("\"new\""));

        let parsed: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.relation(), Relation::Reactions);
        assert_eq!(parsed.article_id(), None);
    }

    #[test]
    fn test_update_without_before_image() {
        let article_id = Uuid::now_v7();
        let json = serde_json::to_string(&ChangeEvent::Views(RowChange::Update {
            new: ViewCounter { article_id, count: 7 },
            old: None,
        }))
        .unwrap();

        let parsed: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.article_id(), Some(article_id));
    }

    #[test]
    fn test_delete_scopes_by_before_image() {
        let article_id = Uuid::now_v7();
        let event = ChangeEvent::Comments(RowChange::Delete {
            old: sample_comment(article_id),
        });
        assert_eq!(event.article_id(), Some(article_id));
    }
}
