//! # AppError
//!
//! Centralized error handling for the Rusty-Press ecosystem.
//! Maps failures at the hosted-service boundary to actionable error types.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Article, Comment, Reaction)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty comment body, oversized payload)
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport/network failure talking to the hosted service
    #[error("transport error: {0}")]
    Transport(String),

    /// Conflicting write (e.g., duplicate reaction for the same viewer)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The live session or its change feed has already been torn down
    #[error("session closed: {0}")]
    Closed(String),
}

impl AppError {
    /// Shorthand for the frequent "row with this id is missing" case.
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(what.to_string(), id.to_string())
    }
}

/// A specialized Result type for Rusty-Press logic.
pub type Result<T> = std::result::Result<T, AppError>;
