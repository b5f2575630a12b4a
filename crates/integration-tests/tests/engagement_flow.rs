//! End-to-end reader session against the in-memory backend: snapshot,
//! realtime folding, writes through the session, moderation wipes, and
//! article switching, all through the public ports.

use std::sync::Arc;

use uuid::Uuid;

use domains::{ChangeFeed, ContentStore, NewComment, NewReaction, Polarity};
use integration_tests::{reader_name, seeded_backend, wait_until};
use services::{LiveConfig, LiveSession, SessionPhase};

#[tokio::test]
async fn test_full_reader_session() {
    let (backend, articles) = seeded_backend(1);
    let article = &articles[0];
    let viewer = Uuid::now_v7();

    let store: Arc<dyn ContentStore> = backend.clone();
    let feed: Arc<dyn ChangeFeed> = backend.clone();
    let config = LiveConfig {
        viewer: Some(viewer),
        ..LiveConfig::default()
    };
    let session = LiveSession::open(store, feed, article.id, config)
        .await
        .unwrap();
    let mut rx = session.watch();

    // Opening the page counts exactly one view.
    let summary = wait_until(&mut rx, |s| s.view_count == 1).await;
    assert_eq!(summary.phase, SessionPhase::Live);
    assert_eq!(summary.article_id, article.id);

    // Another reader reacts; the stream keeps this page current.
    backend
        .insert_reaction(NewReaction {
            article_id: article.id,
            user_id: None,
            liked: true,
        })
        .await
        .unwrap();
    wait_until(&mut rx, |s| s.like_count == 1).await;

    // The viewer reacts through the session and sees their own polarity.
    session.react(Polarity::Dislike).unwrap();
    let summary = wait_until(&mut rx, |s| s.dislike_count == 1).await;
    assert_eq!(summary.viewer_reaction, Some(Polarity::Dislike));
    assert_eq!(summary.like_count, 1);

    // Flipping updates the existing row instead of adding a second one.
    session.react(Polarity::Like).unwrap();
    let summary = wait_until(&mut rx, |s| s.like_count == 2).await;
    assert_eq!(summary.dislike_count, 0);
    assert_eq!(summary.viewer_reaction, Some(Polarity::Like));

    // And clearing removes it.
    session.clear_reaction().unwrap();
    let summary = wait_until(&mut rx, |s| s.like_count == 1).await;
    assert_eq!(summary.viewer_reaction, None);

    // A submitted comment is confirmed by the service and lands exactly once.
    session.submit_comment(reader_name(), "great piece").unwrap();
    let summary = wait_until(&mut rx, |s| {
        s.comments.len() == 1 && s.pending_comments.is_empty()
    })
    .await;
    assert_eq!(summary.comments[0].body, "great piece");

    session.close().await;
}

#[tokio::test]
async fn test_moderation_wipe_rebuilds_from_snapshot() {
    let (backend, articles) = seeded_backend(1);
    let article = &articles[0];
    let viewer = Uuid::now_v7();

    let config = LiveConfig {
        viewer: Some(viewer),
        ..LiveConfig::default()
    };
    let session = LiveSession::open(backend.clone(), backend.clone(), article.id, config)
        .await
        .unwrap();
    let mut rx = session.watch();

    wait_until(&mut rx, |s| s.view_count == 1).await;
    session.react(Polarity::Like).unwrap();
    wait_until(&mut rx, |s| s.like_count == 1).await;

    // Moderation wipes the relation; the page rebuilds from a fresh snapshot.
    backend.clear_reactions();
    let summary = wait_until(&mut rx, |s| {
        s.like_count == 0 && s.viewer_reaction.is_none() && s.phase == SessionPhase::Live
    })
    .await;
    assert_eq!(summary.view_count, 1);

    session.close().await;
}

#[tokio::test]
async fn test_switching_articles_resets_scope() {
    let (backend, articles) = seeded_backend(2);
    let first = &articles[0];
    let second = &articles[1];

    // Engagement left on the first article by earlier readers.
    backend
        .insert_comment(NewComment {
            article_id: first.id,
            author: reader_name(),
            body: "only on the first article".to_string(),
        })
        .await
        .unwrap();

    let session = LiveSession::open(
        backend.clone(),
        backend.clone(),
        first.id,
        LiveConfig::default(),
    )
    .await
    .unwrap();
    let mut rx = session.watch();

    wait_until(&mut rx, |s| s.comments.len() == 1 && s.view_count == 1).await;

    session.switch_article(second.id).unwrap();
    let summary = wait_until(&mut rx, |s| {
        s.article_id == second.id && s.phase == SessionPhase::Live && s.view_count == 1
    })
    .await;
    assert!(summary.comments.is_empty());
    assert_eq!(summary.like_count, 0);

    session.close().await;
}
