//! # Rusty-Press Binary
//!
//! The entry point that assembles the client against a backend chosen at
//! compile time, then drives one live article page against simulated
//! traffic: a smoke run and a worked example of the API in one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use configs::Settings;
use domains::{ChangeFeed, ContentStore, NewArticle, NewComment, NewReaction, Polarity};
use services::{FeedService, LiveConfig, LiveSession};

// Feature-gated imports: backends are compiled to order.
#[cfg(feature = "backend-memory")]
use storage_adapters::MemoryBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration and logging
    let settings = Settings::load().context("loading settings")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&settings.log.filter)?)
        .init();

    // 2. Backend assembly
    #[cfg(feature = "backend-memory")]
    let backend = Arc::new(MemoryBackend::new(settings.live.event_buffer));

    let store: Arc<dyn ContentStore> = backend.clone();
    let feed: Arc<dyn ChangeFeed> = backend.clone();

    // 3. Demo content
    let article = backend.publish_article(NewArticle {
        title: "Rusty-Press goes live".to_string(),
        body: "A hosted backend, one subscription, and a lot of folding.".to_string(),
        tags: vec!["meta".to_string(), "release".to_string()],
        pictures: vec![],
    })?;
    for i in 1..4 {
        backend.publish_article(NewArticle {
            title: format!("Archive piece #{i}"),
            body: "Older news.".to_string(),
            tags: vec!["archive".to_string()],
            pictures: vec![],
        })?;
    }

    let front_page = FeedService::new(store.clone(), settings.feed.page_size);
    for row in front_page.page(0).await? {
        info!(title = %row.title, "front page");
    }

    // 4. One reader's live page
    let viewer = Uuid::now_v7();
    let session = LiveSession::open(
        store,
        feed,
        article.id,
        LiveConfig {
            viewer: Some(viewer),
            pending_comment_ttl: settings.live.pending_comment_ttl(),
            sweep_interval: settings.live.sweep_interval(),
        },
    )
    .await?;
    let mut summaries = session.watch();

    // 5. A simulated crowd on other devices
    let crowd = tokio::spawn({
        let backend = backend.clone();
        let article_id = article.id;
        async move {
            for i in 0..5u32 {
                let _ = backend
                    .insert_reaction(NewReaction {
                        article_id,
                        user_id: None,
                        liked: i % 2 == 0,
                    })
                    .await;
                let _ = backend
                    .insert_comment(NewComment {
                        article_id,
                        author: format!("reader-{i}"),
                        body: format!("hot take #{i}"),
                    })
                    .await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    });

    // The viewer engages too.
    session.react(Polarity::Like)?;
    session.submit_comment("you", "follow for more")?;

    crowd.await?;
    // Let the last stream events drain before reading the final state.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let last = summaries.borrow_and_update().clone();
    info!(
        likes = last.like_count,
        dislikes = last.dislike_count,
        comments = last.comments.len(),
        views = last.view_count,
        "final page state"
    );

    session.close().await;
    Ok(())
}
