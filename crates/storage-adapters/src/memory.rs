//! # Memory Backend
//!
//! In-process stand-in for the hosted service: `DashMap` relation tables
//! plus a broadcast change feed. Where it matters to the client the
//! semantics follow the real thing: server-assigned ids and timestamps,
//! relation-wide truncate events, an atomic upsert-increment for view
//! counters, and no uniqueness enforcement on reactions (that invariant
//! belongs to client logic).

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use domains::{
    AppError, Article, ArticleSnapshot, ArticleSummary, ChangeEvent, ChangeFeed,
    ChangeSubscription, Comment, ContentStore, NewArticle, NewComment, NewReaction, Reaction,
    Relation, Result, RowChange, ViewCounter,
};

/// Upper bound on comment bodies, matching the hosted service's column cap.
const MAX_COMMENT_LEN: usize = 4_000;

pub struct MemoryBackend {
    articles: DashMap<Uuid, Article>,
    comments: DashMap<Uuid, Comment>,
    reactions: DashMap<Uuid, Reaction>,
    views: DashMap<Uuid, u64>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryBackend {
    /// `event_buffer` is the broadcast capacity per subscriber; slow
    /// subscribers past it lag and drop events, same as the hosted stream.
    pub fn new(event_buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(event_buffer.max(1));
        MemoryBackend {
            articles: DashMap::new(),
            comments: DashMap::new(),
            reactions: DashMap::new(),
            views: DashMap::new(),
            changes,
        }
    }

    fn emit(&self, event: ChangeEvent) {
        // No subscribers is not an error; mutations happen on idle relations
        // all the time.
        let _ = self.changes.send(event);
    }

    // ── Maintenance surface (the admin client, in miniature) ──────────────

    /// Publishes an article. Articles are not a streamed relation; readers
    /// pick them up via the snapshot query.
    pub fn publish_article(&self, new: NewArticle) -> Result<Article> {
        let title = clean_text("title", &new.title, 200)?;
        let article = Article {
            id: Uuid::now_v7(),
            title,
            body: new.body,
            created_at: Utc::now(),
            tags: new.tags,
            pictures: new.pictures,
        };
        self.articles.insert(article.id, article.clone());
        Ok(article)
    }

    pub fn edit_comment(&self, id: Uuid, body: &str) -> Result<Comment> {
        let body = clean_text("body", body, MAX_COMMENT_LEN)?;
        let mut entry = self
            .comments
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("comment", id))?;
        let old = entry.value().clone();
        entry.body = body;
        let new = entry.value().clone();
        drop(entry);

        self.emit(ChangeEvent::Comments(RowChange::Update {
            new: new.clone(),
            old: Some(old),
        }));
        Ok(new)
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<()> {
        let (_, old) = self
            .comments
            .remove(&id)
            .ok_or_else(|| AppError::not_found("comment", id))?;
        self.emit(ChangeEvent::Comments(RowChange::Delete { old }));
        Ok(())
    }

    pub fn clear_comments(&self) {
        self.comments.clear();
        self.emit(ChangeEvent::Comments(RowChange::Truncate));
    }

    pub fn clear_reactions(&self) {
        self.reactions.clear();
        self.emit(ChangeEvent::Reactions(RowChange::Truncate));
    }

    pub fn clear_views(&self) {
        self.views.clear();
        self.emit(ChangeEvent::Views(RowChange::Truncate));
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend::new(256)
    }
}

#[async_trait]
impl ContentStore for MemoryBackend {
    async fn article_snapshot(&self, article_id: Uuid) -> Result<Option<ArticleSnapshot>> {
        let article = match self.articles.get(&article_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|entry| entry.article_id == article_id)
            .map(|entry| entry.value().clone())
            .collect();
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let reactions: Vec<Reaction> = self
            .reactions
            .iter()
            .filter(|entry| entry.article_id == article_id)
            .map(|entry| entry.value().clone())
            .collect();

        let view_count = self.views.get(&article_id).map(|entry| *entry).unwrap_or(0);

        Ok(Some(ArticleSnapshot {
            article,
            comments,
            reactions,
            view_count,
        }))
    }

    async fn list_articles(&self, limit: i64, offset: i64) -> Result<Vec<ArticleSummary>> {
        let limit = usize::try_from(limit)
            .map_err(|_| AppError::Validation("negative limit".to_string()))?;
        let offset = usize::try_from(offset)
            .map_err(|_| AppError::Validation("negative offset".to_string()))?;

        let mut articles: Vec<Article> = self.articles.iter().map(|entry| entry.value().clone()).collect();
        articles.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(articles
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|article| ArticleSummary {
                id: article.id,
                title: article.title,
                created_at: article.created_at,
                tags: article.tags,
                lead_picture: article.pictures.into_iter().next(),
            })
            .collect())
    }

    async fn insert_reaction(&self, new: NewReaction) -> Result<Reaction> {
        self.require_article(new.article_id)?;
        let row = Reaction {
            id: Uuid::now_v7(),
            article_id: new.article_id,
            user_id: new.user_id,
            liked: new.liked,
        };
        self.reactions.insert(row.id, row.clone());
        self.emit(ChangeEvent::Reactions(RowChange::Insert {
            new: row.clone(),
        }));
        Ok(row)
    }

    async fn update_reaction(&self, id: Uuid, liked: bool) -> Result<Reaction> {
        let mut entry = self
            .reactions
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("reaction", id))?;
        let old = entry.value().clone();
        entry.liked = liked;
        let new = entry.value().clone();
        drop(entry);

        self.emit(ChangeEvent::Reactions(RowChange::Update {
            new: new.clone(),
            old: Some(old),
        }));
        Ok(new)
    }

    async fn delete_reaction(&self, id: Uuid) -> Result<()> {
        let (_, old) = self
            .reactions
            .remove(&id)
            .ok_or_else(|| AppError::not_found("reaction", id))?;
        self.emit(ChangeEvent::Reactions(RowChange::Delete { old }));
        Ok(())
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        self.require_article(new.article_id)?;
        let author = clean_text("author", &new.author, 80)?;
        let body = clean_text("body", &new.body, MAX_COMMENT_LEN)?;

        let row = Comment {
            id: Uuid::now_v7(),
            article_id: new.article_id,
            author,
            body,
            created_at: Utc::now(),
        };
        self.comments.insert(row.id, row.clone());
        self.emit(ChangeEvent::Comments(RowChange::Insert {
            new: row.clone(),
        }));
        Ok(row)
    }

    async fn bump_view_count(&self, article_id: Uuid) -> Result<Option<u64>> {
        self.require_article(article_id)?;

        let (row, fresh) = {
            let mut entry = self.views.entry(article_id).or_insert(0);
            let fresh = *entry == 0;
            *entry += 1;
            (
                ViewCounter {
                    article_id,
                    count: *entry,
                },
                fresh,
            )
        };

        let count = row.count;
        if fresh {
            self.emit(ChangeEvent::Views(RowChange::Insert { new: row }));
        } else {
            self.emit(ChangeEvent::Views(RowChange::Update {
                old: Some(ViewCounter {
                    article_id,
                    count: count - 1,
                }),
                new: row,
            }));
        }
        Ok(Some(count))
    }
}

impl MemoryBackend {
    fn require_article(&self, article_id: Uuid) -> Result<()> {
        if self.articles.contains_key(&article_id) {
            Ok(())
        } else {
            Err(AppError::not_found("article", article_id))
        }
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(&self, relations: &[Relation]) -> Result<Box<dyn ChangeSubscription>> {
        Ok(Box::new(MemorySubscription {
            rx: self.changes.subscribe(),
            relations: relations.to_vec(),
        }))
    }
}

struct MemorySubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    relations: Vec<Relation>,
}

#[async_trait]
impl ChangeSubscription for MemorySubscription {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.relations.contains(&event.relation()) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed lagged; events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

fn clean_text(field: &str, value: &str, max_len: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::Validation(format!(
            "{field} exceeds {max_len} characters"
        )));
    }
    Ok(value.to_string())
}
