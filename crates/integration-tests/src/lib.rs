//! rusty-press/crates/integration-tests/src/lib.rs
//!
//! Shared fixtures for the cross-crate scenario tests: a seeded in-memory
//! backend and a watch-channel helper for awaiting published state.

use std::time::Duration;

use fake::faker::name::en::Name;
use fake::Fake;
use tokio::sync::watch;

use services::EngagementSummary;

/// Awaits the first published summary satisfying `predicate`, with a test
/// timeout so a wedged driver fails loudly instead of hanging the suite.
pub async fn wait_until(
    rx: &mut watch::Receiver<EngagementSummary>,
    predicate: impl FnMut(&EngagementSummary) -> bool,
) -> EngagementSummary {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("summary never reached the expected state")
        .expect("session dropped the summary channel")
        .clone()
}

/// A plausible reader display name.
pub fn reader_name() -> String {
    Name().fake()
}

#[cfg(feature = "backend-memory")]
pub use memory_fixtures::*;

#[cfg(feature = "backend-memory")]
mod memory_fixtures {
    use std::sync::Arc;

    use domains::{Article, NewArticle};
    use fake::faker::lorem::en::{Paragraph, Sentence};
    use fake::Fake;
    use storage_adapters::MemoryBackend;

    /// A backend pre-populated with `articles` generated articles, returned
    /// oldest-first.
    pub fn seeded_backend(articles: usize) -> (Arc<MemoryBackend>, Vec<Article>) {
        let backend = Arc::new(MemoryBackend::default());
        let rows = (0..articles)
            .map(|_| {
                let title: String = Sentence(3..6).fake();
                let body: String = Paragraph(2..4).fake();
                backend
                    .publish_article(NewArticle {
                        title,
                        body,
                        tags: vec!["news".to_string()],
                        pictures: vec![],
                    })
                    .expect("fixture article")
            })
            .collect();
        (backend, rows)
    }
}
