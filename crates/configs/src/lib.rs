//! rusty-press/crates/configs/src/lib.rs
//!
//! Layered runtime settings for Rusty-Press: built-in defaults, an optional
//! TOML file, and `RUSTY_PRESS__`-prefixed environment variables, in
//! ascending precedence.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub log: LogSettings,
    pub live: LiveSettings,
    pub feed: FeedSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. "info" or "services=debug,info"
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveSettings {
    /// Broadcast capacity per change-feed subscriber
    pub event_buffer: usize,
    pub pending_comment_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl LiveSettings {
    pub fn pending_comment_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_comment_ttl_secs)
    }

    /// Never zero: a zero-period sweep would spin.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub page_size: u32,
}

impl Settings {
    /// Production entry point: `.env`, then `config/default.toml` when
    /// present, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        // .env is a developer convenience; absence is normal.
        dotenvy::dotenv().ok();
        Self::load_layered(Some(Path::new("config/default")))
    }

    /// Same layering with an explicit file stem, for tests and tooling.
    pub fn load_layered(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("log.filter", "info")?
            .set_default("live.event_buffer", 256_i64)?
            .set_default("live.pending_comment_ttl_secs", 10_i64)?
            .set_default("live.sweep_interval_secs", 1_i64)?
            .set_default("feed.page_size", 20_i64)?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file.to_path_buf()).required(false));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("RUSTY_PRESS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        debug!(?settings, "settings loaded");
        Ok(settings)
    }
}
