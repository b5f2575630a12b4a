//! # Engagement Projection
//!
//! The pure fold at the core of the realtime article page: change events for
//! reactions, comments, and view counters are merged into locally derived
//! state for exactly one article. No I/O and no side effects, just bookkeeping.
//!
//! Reaction state is keyed by row id and the tallies are derived from
//! membership. The hosted stream offers at-least-once delivery, so replaying
//! any single insert/update/delete must not skew the counts; an upsert into
//! a map is idempotent where a running counter is not.

use std::collections::HashMap;

use uuid::Uuid;

use domains::{ArticleSnapshot, ChangeEvent, Comment, Polarity, Reaction, RowChange, ViewCounter};

/// What the fold did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// Local state absorbed the event.
    Applied,
    /// The event was discarded: foreign article, unseen row, or no usable payload.
    Ignored,
    /// The event invalidated local state wholesale; a fresh snapshot is required.
    Resync,
}

/// One reaction row as the projection remembers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReactionMark {
    user_id: Option<Uuid>,
    polarity: Polarity,
}

impl ReactionMark {
    fn of(row: &Reaction) -> Self {
        ReactionMark {
            user_id: row.user_id,
            polarity: row.polarity(),
        }
    }
}

/// Locally derived engagement state for a single article.
///
/// Lifetime is one page activation: switching articles replaces the whole
/// projection rather than mutating it across identities.
#[derive(Debug, Clone)]
pub struct EngagementProjection {
    article_id: Uuid,
    viewer: Option<Uuid>,
    reactions: HashMap<Uuid, ReactionMark>,
    comments: Vec<Comment>,
    view_count: u64,
}

impl EngagementProjection {
    /// An empty projection scoped to `article_id`. `viewer` is the
    /// authenticated reader, when there is one.
    pub fn new(article_id: Uuid, viewer: Option<Uuid>) -> Self {
        EngagementProjection {
            article_id,
            viewer,
            reactions: HashMap::new(),
            comments: Vec::new(),
            view_count: 0,
        }
    }

    /// Rebuilds every piece of derived state from a snapshot. Rows scoped to
    /// a different article are dropped, same as on the live path.
    pub fn reset_from(&mut self, snapshot: &ArticleSnapshot) {
        self.reactions.clear();
        self.comments.clear();
        for row in &snapshot.reactions {
            if row.article_id == self.article_id {
                self.reactions.insert(row.id, ReactionMark::of(row));
            }
        }
        for row in &snapshot.comments {
            if row.article_id == self.article_id {
                self.comments.push(row.clone());
            }
        }
        sort_comments(&mut self.comments);
        self.view_count = snapshot.view_count;
    }

    /// Folds one stream event into local state.
    pub fn apply(&mut self, event: &ChangeEvent) -> FoldOutcome {
        match event {
            ChangeEvent::Reactions(change) => self.fold_reaction(change),
            ChangeEvent::Comments(change) => self.fold_comment(change),
            ChangeEvent::Views(change) => self.fold_views(change),
        }
    }

    fn fold_reaction(&mut self, change: &RowChange<Reaction>) -> FoldOutcome {
        match change {
            RowChange::Insert { new } | RowChange::Update { new, .. } => {
                if new.article_id != self.article_id {
                    return FoldOutcome::Ignored;
                }
                // Insert and polarity flip are the same upsert; an update
                // with unchanged polarity lands on the value already there.
                self.reactions.insert(new.id, ReactionMark::of(new));
                FoldOutcome::Applied
            }
            RowChange::Delete { old } => {
                if old.article_id != self.article_id {
                    return FoldOutcome::Ignored;
                }
                if self.reactions.remove(&old.id).is_none() {
                    return FoldOutcome::Ignored;
                }
                FoldOutcome::Applied
            }
            RowChange::Truncate => {
                // Truncate names no rows, so the tallies cannot be rebuilt
                // locally: hand the problem back to the snapshot query.
                self.reactions.clear();
                FoldOutcome::Resync
            }
        }
    }

    fn fold_comment(&mut self, change: &RowChange<Comment>) -> FoldOutcome {
        match change {
            RowChange::Insert { new } | RowChange::Update { new, .. } => {
                if new.article_id != self.article_id {
                    return FoldOutcome::Ignored;
                }
                self.upsert_comment(new.clone());
                FoldOutcome::Applied
            }
            RowChange::Delete { old } => {
                if old.article_id != self.article_id {
                    return FoldOutcome::Ignored;
                }
                let before = self.comments.len();
                self.comments.retain(|c| c.id != old.id);
                if self.comments.len() == before {
                    return FoldOutcome::Ignored;
                }
                FoldOutcome::Applied
            }
            RowChange::Truncate => {
                self.comments.clear();
                FoldOutcome::Applied
            }
        }
    }

    fn fold_views(&mut self, change: &RowChange<ViewCounter>) -> FoldOutcome {
        match change {
            RowChange::Insert { new } | RowChange::Update { new, .. } => {
                if new.article_id != self.article_id {
                    return FoldOutcome::Ignored;
                }
                self.view_count = new.count;
                FoldOutcome::Applied
            }
            // A counter delete carries no after image to replace with.
            RowChange::Delete { .. } => FoldOutcome::Ignored,
            RowChange::Truncate => {
                self.view_count = 0;
                FoldOutcome::Applied
            }
        }
    }

    /// Replace-by-id then re-sort: idempotent, and order-independent with
    /// respect to the final list content.
    fn upsert_comment(&mut self, comment: Comment) {
        self.comments.retain(|c| c.id != comment.id);
        self.comments.push(comment);
        sort_comments(&mut self.comments);
    }

    pub fn article_id(&self) -> Uuid {
        self.article_id
    }

    pub fn viewer(&self) -> Option<Uuid> {
        self.viewer
    }

    pub fn like_count(&self) -> u64 {
        self.count_polarity(Polarity::Like)
    }

    pub fn dislike_count(&self) -> u64 {
        self.count_polarity(Polarity::Dislike)
    }

    fn count_polarity(&self, polarity: Polarity) -> u64 {
        self.reactions
            .values()
            .filter(|mark| mark.polarity == polarity)
            .count() as u64
    }

    /// The viewer's own live reaction row, if the stream has shown one.
    /// Used to decide between insert, update, and delete when the viewer
    /// reacts again.
    pub fn viewer_mark(&self) -> Option<(Uuid, Polarity)> {
        let viewer = self.viewer?;
        self.reactions
            .iter()
            .find(|(_, mark)| mark.user_id == Some(viewer))
            .map(|(id, mark)| (*id, mark.polarity))
    }

    pub fn viewer_reaction(&self) -> Option<Polarity> {
        self.viewer_mark().map(|(_, polarity)| polarity)
    }

    /// Confirmed comments, ascending by creation time.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn view_count(&self) -> u64 {
        self.view_count
    }

    /// Direct overwrite for the authoritative count returned by the view
    /// increment request; bypasses the fold on purpose.
    pub fn set_view_count(&mut self, count: u64) {
        self.view_count = count;
    }
}

fn sort_comments(comments: &mut [Comment]) {
    comments.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
