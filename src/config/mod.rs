//! Configuration management for groupbot
//!
//! Values are layered: environment variables, then the TOML config file,
//! then defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

use file::GroupbotConfigFile;

/// Longest accepted deadline for a batch of bot callbacks
pub const MAX_CALLBACK_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Longest accepted lifetime of a cached pattern table
pub const MAX_PATTERN_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Groupbot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database)
    pub data_dir: PathBuf,

    /// Path to the `SQLite` database
    pub database_path: PathBuf,

    /// Bot engine configuration
    pub engine: EngineConfig,
}

/// Bot engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shared deadline for one batch of bot callbacks
    pub callback_timeout: Duration,

    /// Prefix prepended to the thread title for bot replies
    pub reply_title_prefix: String,

    /// How long a compiled pattern table stays cached
    pub pattern_cache_ttl: Duration,

    /// Max number of cached pattern tables
    pub pattern_cache_capacity: u64,

    /// User agent for callback requests
    pub user_agent: String,

    /// Accepted age of callback auth tags (receiver side)
    pub token_max_age: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            callback_timeout: Duration::from_secs(10),
            reply_title_prefix: "Re: ".to_string(),
            pattern_cache_ttl: Duration::from_secs(300),
            pattern_cache_capacity: 1024,
            user_agent: format!("Groupbot/{}", env!("CARGO_PKG_VERSION")),
            token_max_age: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, &|key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed config file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if the callback timeout is zero or above
    /// [`MAX_CALLBACK_TIMEOUT`], or the pattern cache TTL is above
    /// [`MAX_PATTERN_CACHE_TTL`]
    pub fn from_sources(
        fc: GroupbotConfigFile,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        // Data directory (~/.local/share/groupbot on Linux)
        let data_dir = env("GROUPBOT_DATA_DIR").map_or_else(
            || {
                directories::BaseDirs::new()
                    .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("groupbot"))
            },
            PathBuf::from,
        );

        let database_path = env("GROUPBOT_DB")
            .or(fc.database.path)
            .map_or_else(|| data_dir.join("groupbot.db"), PathBuf::from);

        let default = EngineConfig::default();
        let fe = fc.engine;

        let callback_timeout_secs = env("GROUPBOT_CALLBACK_TIMEOUT")
            .and_then(|s| s.parse().ok())
            .or(fe.callback_timeout_secs)
            .unwrap_or(default.callback_timeout.as_secs());
        if callback_timeout_secs == 0 {
            return Err(Error::Config(
                "callback timeout must be at least 1 second".to_string(),
            ));
        }
        if callback_timeout_secs > MAX_CALLBACK_TIMEOUT.as_secs() {
            return Err(Error::Config(format!(
                "callback timeout must be at most {} seconds",
                MAX_CALLBACK_TIMEOUT.as_secs()
            )));
        }

        let pattern_cache_ttl = env("GROUPBOT_PATTERN_CACHE_TTL")
            .and_then(|s| s.parse().ok())
            .or(fe.pattern_cache_ttl_secs)
            .map_or(default.pattern_cache_ttl, Duration::from_secs);
        if pattern_cache_ttl > MAX_PATTERN_CACHE_TTL {
            return Err(Error::Config(format!(
                "pattern cache TTL must be at most {} seconds",
                MAX_PATTERN_CACHE_TTL.as_secs()
            )));
        }

        let engine = EngineConfig {
            callback_timeout: Duration::from_secs(callback_timeout_secs),
            reply_title_prefix: env("GROUPBOT_REPLY_PREFIX")
                .or(fe.reply_title_prefix)
                .unwrap_or(default.reply_title_prefix),
            pattern_cache_ttl,
            pattern_cache_capacity: fe
                .pattern_cache_capacity
                .unwrap_or(default.pattern_cache_capacity),
            user_agent: fe.user_agent.unwrap_or(default.user_agent),
            token_max_age: env("GROUPBOT_TOKEN_MAX_AGE")
                .and_then(|s| s.parse().ok())
                .or(fe.token_max_age_secs)
                .map_or(default.token_max_age, Duration::from_secs),
        };

        Ok(Self {
            data_dir,
            database_path,
            engine,
        })
    }
}
