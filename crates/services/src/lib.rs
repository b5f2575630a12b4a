//! rusty-press/crates/services/src/lib.rs
//!
//! Orchestration over the domain ports: the engagement projection and its
//! live session driver for the article page, plus the paginated feed query.

pub mod engagement;
pub mod feed;
pub mod live;

pub use engagement::{EngagementProjection, FoldOutcome};
pub use feed::FeedService;
pub use live::{EngagementSummary, LiveConfig, LiveSession, SessionPhase};
