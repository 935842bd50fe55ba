//! TTL cache of compiled pattern tables

use std::sync::Arc;
use std::time::Duration;

use mini_moka::sync::Cache;

use super::PatternStore;
use super::pattern::{self, CompiledPattern};
use crate::Result;
use crate::config::MAX_PATTERN_CACHE_TTL;

/// Compiled pattern tables keyed by bot ID
///
/// Tables are compiled once per TTL period. Hosts that edit a bot's table
/// call [`PatternCache::invalidate`] to pick up changes immediately.
#[derive(Clone)]
pub struct PatternCache {
    tables: Cache<String, Arc<Vec<CompiledPattern>>>,
}

impl PatternCache {
    /// Create a cache holding up to `capacity` tables for `ttl`
    ///
    /// `ttl` is capped at [`MAX_PATTERN_CACHE_TTL`].
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            tables: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl.min(MAX_PATTERN_CACHE_TTL))
                .build(),
        }
    }

    /// Get a bot's compiled table, loading it from `store` on a miss
    ///
    /// # Errors
    ///
    /// Returns error if the pattern store fails
    pub fn get_or_load(
        &self,
        bot_id: &str,
        store: &dyn PatternStore,
    ) -> Result<Arc<Vec<CompiledPattern>>> {
        if let Some(table) = self.tables.get(&bot_id.to_string()) {
            return Ok(table);
        }

        let patterns = store.patterns(bot_id)?;
        let table = Arc::new(pattern::compile_all(bot_id, patterns));
        self.tables.insert(bot_id.to_string(), Arc::clone(&table));

        Ok(table)
    }

    /// Drop a bot's cached table
    pub fn invalidate(&self, bot_id: &str) {
        self.tables.invalidate(&bot_id.to_string());
    }
}

impl std::fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCache")
            .field("entries", &self.tables.entry_count())
            .finish()
    }
}
