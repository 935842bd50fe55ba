//! TOML configuration file loading
//!
//! Supports `~/.config/groupbot/config.toml` (or `$GROUPBOT_CONFIG`) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GroupbotConfigFile {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseFileConfig,

    /// Bot engine configuration
    #[serde(default)]
    pub engine: EngineFileConfig,
}

/// Database configuration
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    /// Path to the `SQLite` database
    pub path: Option<String>,
}

/// Bot engine configuration
#[derive(Debug, Default, Deserialize)]
pub struct EngineFileConfig {
    /// Shared deadline for a batch of bot callbacks, in seconds
    pub callback_timeout_secs: Option<u64>,

    /// Prefix marking a reply title as a follow-up
    pub reply_title_prefix: Option<String>,

    /// How long compiled pattern tables stay cached, in seconds
    pub pattern_cache_ttl_secs: Option<u64>,

    /// Max number of cached pattern tables
    pub pattern_cache_capacity: Option<u64>,

    /// User agent for callback requests
    pub user_agent: Option<String>,

    /// Accepted age of callback auth tags, in seconds
    pub token_max_age_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `GroupbotConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> GroupbotConfigFile {
    config_file_path().map_or_else(GroupbotConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or unparsable files fall back to defaults.
pub fn load_from(path: &Path) -> GroupbotConfigFile {
    if !path.exists() {
        return GroupbotConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GroupbotConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GroupbotConfigFile::default()
        }
    }
}

/// Return the config file path: `$GROUPBOT_CONFIG` or `~/.config/groupbot/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GROUPBOT_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("groupbot").join("config.toml"))
}
