//! rusty-press/crates/domains/src/lib.rs
//!
//! The central domain logic and interface definitions for Rusty-Press:
//! entity models, the change-event vocabulary of the hosted stream, and the
//! port contracts every backend adapter implements.

pub mod change;
pub mod error;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use change::*;
pub use error::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use uuid::Uuid;

    #[test]
    fn test_article_creation_v7() {
        let id = Uuid::now_v7();
        let article = Article {
            id,
            title: "Rust 2.0 announced".to_string(),
            body: "Not really.".to_string(),
            created_at: chrono::Utc::now(),
            tags: vec!["rust".to_string(), "satire".to_string()],
            pictures: vec!["https://cdn.example/cover.webp".to_string()],
        };
        assert_eq!(article.id, id);
        assert_eq!(article.tags.len(), 2);
    }

    #[test]
    fn test_polarity_from_stored_flag() {
        assert_eq!(Polarity::from_liked(true), Polarity::Like);
        assert_eq!(Polarity::from_liked(false), Polarity::Dislike);
        assert!(Polarity::Like.is_like());
    }
}
