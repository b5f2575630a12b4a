//! # Live Session
//!
//! One `LiveSession` per rendered article page. It owns the page's single
//! change-stream subscription, folds events through the projection strictly
//! in delivery order, issues the once-per-activation view increment, and
//! publishes the merged state over a `watch` channel for the page component
//! to render.
//!
//! All folding happens on one driver task; snapshot fetches and writes run
//! as spawned requests whose completions are funneled back into the same
//! loop, tagged with the activation generation so anything that resolves
//! after a teardown or article switch is dropped on the floor.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use domains::{
    AppError, ArticleSnapshot, ChangeEvent, ChangeFeed, ChangeSubscription, Comment, ContentStore,
    NewComment, NewReaction, Polarity, Result, RowChange, ALL_RELATIONS,
};

use crate::engagement::{EngagementProjection, FoldOutcome};

/// Tuning for one live session.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// The authenticated reader, when there is one. Anonymous viewers can
    /// react (legacy anonymous rows) but have no polarity of their own.
    pub viewer: Option<Uuid>,
    /// How long an unconfirmed comment stays visible before it is dropped.
    pub pending_comment_ttl: Duration,
    /// Cadence of the pending-comment sweep.
    pub sweep_interval: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            viewer: None,
            pending_comment_ttl: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Where the page stands with respect to its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting for the first snapshot of the current article.
    Loading,
    /// Snapshot applied; the stream keeps it current.
    Live,
    /// The current article has no snapshot and none is coming.
    Failed,
}

/// Everything the page needs to render, published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementSummary {
    pub phase: SessionPhase,
    pub article_id: Uuid,
    pub like_count: u64,
    pub dislike_count: u64,
    pub viewer_reaction: Option<Polarity>,
    /// Confirmed comments, ascending by creation time.
    pub comments: Vec<Comment>,
    /// Locally submitted comments still awaiting service confirmation.
    pub pending_comments: Vec<Comment>,
    pub view_count: u64,
}

/// Handle to a running session. Cheap to use from UI code: commands are
/// fire-and-forget (write failures surface as log warnings, per the page's
/// non-blocking error policy) and state arrives over the watch channel.
pub struct LiveSession {
    commands: mpsc::UnboundedSender<Command>,
    summary: watch::Receiver<EngagementSummary>,
    driver: JoinHandle<()>,
}

impl LiveSession {
    /// Activates a session for `article_id`: fetches the initial snapshot
    /// (failure here is the blocking, page-banner case), opens the one
    /// multiplexed subscription, and spawns the driver.
    pub async fn open(
        store: Arc<dyn ContentStore>,
        feed: Arc<dyn ChangeFeed>,
        article_id: Uuid,
        config: LiveConfig,
    ) -> Result<Self> {
        let snapshot = store
            .article_snapshot(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("article", article_id))?;
        let subscription = feed.subscribe(&ALL_RELATIONS).await?;

        let mut projection = EngagementProjection::new(article_id, config.viewer);
        projection.reset_from(&snapshot);

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let (summary_tx, summary) =
            watch::channel(render_summary(SessionPhase::Live, &projection, &[]));

        let driver = Driver {
            store,
            feed,
            config,
            generation: 0,
            views_bumped: false,
            phase: SessionPhase::Live,
            feed_open: true,
            projection,
            pending: Vec::new(),
            subscription,
            commands: command_rx,
            completions,
            completion_tx,
            summary_tx,
        };

        Ok(LiveSession {
            commands,
            summary,
            driver: tokio::spawn(driver.run()),
        })
    }

    /// Latest published state.
    pub fn summary(&self) -> EngagementSummary {
        self.summary.borrow().clone()
    }

    /// A receiver for awaiting state changes.
    pub fn watch(&self) -> watch::Receiver<EngagementSummary> {
        self.summary.clone()
    }

    /// Sets the viewer's reaction. A repeat of the current polarity is a
    /// no-op; a different polarity updates the existing row in place, which
    /// is how the one-reaction-per-viewer rule is kept.
    pub fn react(&self, polarity: Polarity) -> Result<()> {
        self.send(Command::React { polarity })
    }

    /// Removes the viewer's reaction, if the stream has shown one.
    pub fn clear_reaction(&self) -> Result<()> {
        self.send(Command::ClearReaction)
    }

    /// Submits a comment. It shows up in `pending_comments` immediately and
    /// moves to `comments` once the service confirms it.
    pub fn submit_comment(&self, author: impl Into<String>, body: impl Into<String>) -> Result<()> {
        self.send(Command::SubmitComment {
            author: author.into(),
            body: body.into(),
        })
    }

    /// Repoints the session at another article: tears down the old
    /// subscription, resets all derived state, and loads the new snapshot.
    pub fn switch_article(&self, article_id: Uuid) -> Result<()> {
        self.send(Command::SwitchArticle { article_id })
    }

    /// Graceful teardown; waits for the driver to stop.
    pub async fn close(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = (&mut self.driver).await;
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| AppError::Closed("live session driver is gone".to_string()))
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

enum Command {
    React { polarity: Polarity },
    ClearReaction,
    SubmitComment { author: String, body: String },
    SwitchArticle { article_id: Uuid },
    Shutdown,
}

/// Completion of a spawned request, tagged with the activation generation
/// it belongs to.
enum Completion {
    Snapshot {
        generation: u64,
        result: Result<Option<ArticleSnapshot>>,
    },
    ViewsBumped {
        generation: u64,
        result: Result<Option<u64>>,
    },
    CommentStored {
        generation: u64,
        temp_id: Uuid,
        result: Result<Comment>,
    },
    ReactionWritten {
        generation: u64,
        result: Result<()>,
    },
}

impl Completion {
    fn generation(&self) -> u64 {
        match self {
            Completion::Snapshot { generation, .. }
            | Completion::ViewsBumped { generation, .. }
            | Completion::CommentStored { generation, .. }
            | Completion::ReactionWritten { generation, .. } => *generation,
        }
    }
}

struct PendingComment {
    /// `comment.id` is the client-generated temporary id.
    comment: Comment,
    expires_at: Instant,
}

enum ReactionWrite {
    Insert(NewReaction),
    Update { id: Uuid, liked: bool },
    Delete { id: Uuid },
}

enum Step {
    Command(Option<Command>),
    Completion(Completion),
    Event(Option<ChangeEvent>),
    Sweep,
}

struct Driver {
    store: Arc<dyn ContentStore>,
    feed: Arc<dyn ChangeFeed>,
    config: LiveConfig,
    generation: u64,
    views_bumped: bool,
    phase: SessionPhase,
    feed_open: bool,
    projection: EngagementProjection,
    pending: Vec<PendingComment>,
    subscription: Box<dyn ChangeSubscription>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    summary_tx: watch::Sender<EngagementSummary>,
}

impl Driver {
    async fn run(mut self) {
        self.arm_view_bump();
        self.publish();
        let mut sweep = interval(self.config.sweep_interval);

        loop {
            let step = tokio::select! {
                command = self.commands.recv() => Step::Command(command),
                Some(completion) = self.completions.recv() => Step::Completion(completion),
                event = self.subscription.next_event(), if self.feed_open => Step::Event(event),
                _ = sweep.tick() => Step::Sweep,
            };

            match step {
                Step::Command(None) | Step::Command(Some(Command::Shutdown)) => break,
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Completion(completion) => self.handle_completion(completion),
                Step::Event(Some(event)) => self.handle_event(&event),
                Step::Event(None) => {
                    warn!("change feed closed; realtime updates stopped");
                    self.feed_open = false;
                }
                Step::Sweep => self.sweep_pending(),
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::React { polarity } => self.handle_react(polarity),
            Command::ClearReaction => self.handle_clear_reaction(),
            Command::SubmitComment { author, body } => self.handle_submit_comment(author, body),
            Command::SwitchArticle { article_id } => self.handle_switch(article_id).await,
            Command::Shutdown => {}
        }
    }

    fn handle_react(&mut self, polarity: Polarity) {
        match self.projection.viewer_mark() {
            Some((_, current)) if current == polarity => {
                debug!("reaction unchanged; nothing to write");
            }
            Some((id, _)) => self.spawn_reaction_write(ReactionWrite::Update {
                id,
                liked: polarity.is_like(),
            }),
            None => self.spawn_reaction_write(ReactionWrite::Insert(NewReaction {
                article_id: self.projection.article_id(),
                user_id: self.config.viewer,
                liked: polarity.is_like(),
            })),
        }
    }

    fn handle_clear_reaction(&mut self) {
        match self.projection.viewer_mark() {
            Some((id, _)) => self.spawn_reaction_write(ReactionWrite::Delete { id }),
            None => debug!("no viewer reaction to clear"),
        }
    }

    fn handle_submit_comment(&mut self, author: String, body: String) {
        let author = author.trim().to_string();
        let body = body.trim().to_string();
        if author.is_empty() || body.is_empty() {
            warn!("dropping comment submission with empty author or body");
            return;
        }

        let temp_id = Uuid::now_v7();
        let article_id = self.projection.article_id();
        self.pending.push(PendingComment {
            comment: Comment {
                id: temp_id,
                article_id,
                author: author.clone(),
                body: body.clone(),
                created_at: Utc::now(),
            },
            expires_at: Instant::now() + self.config.pending_comment_ttl,
        });
        self.publish();

        let store = Arc::clone(&self.store);
        let tx = self.completion_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = store
                .insert_comment(NewComment {
                    article_id,
                    author,
                    body,
                })
                .await;
            let _ = tx.send(Completion::CommentStored {
                generation,
                temp_id,
                result,
            });
        });
    }

    async fn handle_switch(&mut self, article_id: Uuid) {
        if article_id == self.projection.article_id() {
            return;
        }

        self.generation += 1;
        self.views_bumped = false;
        self.projection = EngagementProjection::new(article_id, self.config.viewer);
        self.pending.clear();
        self.phase = SessionPhase::Loading;

        // Exactly one subscription per page instance: the old stream goes
        // down before the next one opens.
        match self.feed.subscribe(&ALL_RELATIONS).await {
            Ok(subscription) => {
                self.subscription = subscription;
                self.feed_open = true;
            }
            Err(error) => {
                warn!(%error, "re-subscribe failed; realtime updates stopped");
                self.feed_open = false;
            }
        }

        self.publish();
        self.spawn_snapshot_fetch();
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        match self.projection.apply(event) {
            FoldOutcome::Applied => self.publish(),
            FoldOutcome::Ignored => {
                debug!(relation = ?event.relation(), "discarded event outside this page");
            }
            FoldOutcome::Resync => {
                debug!(relation = ?event.relation(), "relation truncated; rebuilding from snapshot");
                self.publish();
                self.spawn_snapshot_fetch();
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        if completion.generation() != self.generation {
            debug!("dropping completion from a superseded activation");
            return;
        }

        match completion {
            Completion::Snapshot { result, .. } => match result {
                Ok(Some(snapshot)) => {
                    self.projection.reset_from(&snapshot);
                    self.phase = SessionPhase::Live;
                    self.publish();
                    self.arm_view_bump();
                }
                Ok(None) => {
                    warn!("article has no snapshot anymore");
                    self.fail_if_still_loading();
                }
                Err(error) => {
                    warn!(%error, "snapshot fetch failed");
                    self.fail_if_still_loading();
                }
            },
            Completion::ViewsBumped { result, .. } => match result {
                Ok(Some(count)) => {
                    self.projection.set_view_count(count);
                    self.publish();
                }
                Ok(None) => {
                    // The service confirmed the increment but did not echo
                    // the new total.
                    let next = self.projection.view_count() + 1;
                    self.projection.set_view_count(next);
                    self.publish();
                }
                Err(error) => warn!(%error, "view increment failed"),
            },
            Completion::CommentStored {
                temp_id, result, ..
            } => {
                self.pending.retain(|p| p.comment.id != temp_id);
                match result {
                    Ok(row) => {
                        // Same path as the stream echo, so whichever arrives
                        // second lands on an already-correct list.
                        self.projection
                            .apply(&ChangeEvent::Comments(RowChange::Insert { new: row }));
                    }
                    Err(error) => warn!(%error, "comment rejected by the service"),
                }
                self.publish();
            }
            Completion::ReactionWritten { result, .. } => match result {
                Ok(()) => debug!("reaction write confirmed; waiting for the stream echo"),
                Err(error) => warn!(%error, "reaction write failed"),
            },
        }
    }

    fn fail_if_still_loading(&mut self) {
        if self.phase == SessionPhase::Loading {
            self.phase = SessionPhase::Failed;
            self.publish();
        }
    }

    fn sweep_pending(&mut self) {
        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|p| p.expires_at > now);
        if self.pending.len() != before {
            warn!(
                dropped = before - self.pending.len(),
                "unconfirmed comments timed out"
            );
            self.publish();
        }
    }

    /// Issues the view increment for the current activation, at most once.
    fn arm_view_bump(&mut self) {
        if self.views_bumped {
            return;
        }
        self.views_bumped = true;

        let store = Arc::clone(&self.store);
        let tx = self.completion_tx.clone();
        let generation = self.generation;
        let article_id = self.projection.article_id();
        tokio::spawn(async move {
            let result = store.bump_view_count(article_id).await;
            let _ = tx.send(Completion::ViewsBumped { generation, result });
        });
    }

    fn spawn_snapshot_fetch(&self) {
        let store = Arc::clone(&self.store);
        let tx = self.completion_tx.clone();
        let generation = self.generation;
        let article_id = self.projection.article_id();
        tokio::spawn(async move {
            let result = store.article_snapshot(article_id).await;
            let _ = tx.send(Completion::Snapshot { generation, result });
        });
    }

    fn spawn_reaction_write(&self, write: ReactionWrite) {
        let store = Arc::clone(&self.store);
        let tx = self.completion_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = match write {
                ReactionWrite::Insert(new) => store.insert_reaction(new).await.map(|_| ()),
                ReactionWrite::Update { id, liked } => {
                    store.update_reaction(id, liked).await.map(|_| ())
                }
                ReactionWrite::Delete { id } => store.delete_reaction(id).await,
            };
            let _ = tx.send(Completion::ReactionWritten { generation, result });
        });
    }

    fn publish(&self) {
        let _ = self
            .summary_tx
            .send(render_summary(self.phase, &self.projection, &self.pending));
    }
}

fn render_summary(
    phase: SessionPhase,
    projection: &EngagementProjection,
    pending: &[PendingComment],
) -> EngagementSummary {
    EngagementSummary {
        phase,
        article_id: projection.article_id(),
        like_count: projection.like_count(),
        dislike_count: projection.dislike_count(),
        viewer_reaction: projection.viewer_reaction(),
        comments: projection.comments().to_vec(),
        pending_comments: pending.iter().map(|p| p.comment.clone()).collect(),
        view_count: projection.view_count(),
    }
}
