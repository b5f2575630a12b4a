//! # Feed Service
//!
//! The paginated front-page query. Page numbers come from the router;
//! the port speaks limit/offset, so the arithmetic lives here.

use std::sync::Arc;

use domains::{AppError, ArticleSummary, ContentStore, Result};

pub struct FeedService {
    store: Arc<dyn ContentStore>,
    page_size: u32,
}

impl FeedService {
    pub fn new(store: Arc<dyn ContentStore>, page_size: u32) -> Self {
        FeedService {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Returns page `page` (zero-based) of the feed, newest first. A page
    /// past the end is empty, not an error.
    pub async fn page(&self, page: u32) -> Result<Vec<ArticleSummary>> {
        let limit = i64::from(self.page_size);
        let offset = i64::from(page)
            .checked_mul(limit)
            .ok_or_else(|| AppError::Validation("page number out of range".to_string()))?;
        self.store.list_articles(limit, offset).await
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}
