//! Bot pattern table repository

use super::{DbPool, connection};
use crate::bots::{Pattern, PatternStore};
use crate::{Error, Result};

/// A pattern row with its table ID
#[derive(Debug, Clone)]
pub struct StoredPattern {
    pub id: i64,
    pub bot_id: String,
    pub pattern: Pattern,
}

/// Pattern table repository
#[derive(Clone)]
pub struct PatternRepo {
    pool: DbPool,
}

impl PatternRepo {
    /// Create a new pattern repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a pattern to the end of a bot's table
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add(&self, bot_id: &str, pattern: &Pattern) -> Result<i64> {
        let conn = connection(&self.pool)?;

        conn.execute(
            "INSERT INTO bot_patterns
                (bot_id, request, trigger_state, result_state, response, remote_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                bot_id,
                pattern.request,
                pattern.trigger_state,
                pattern.result_state,
                pattern.response,
                pattern.remote_message
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    /// List a bot's table with row IDs
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, bot_id: &str) -> Result<Vec<StoredPattern>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, bot_id, request, trigger_state, result_state, response, remote_message
                 FROM bot_patterns WHERE bot_id = ?1 ORDER BY id",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let rows = stmt
            .query_map([bot_id], |row| {
                Ok(StoredPattern {
                    id: row.get(0)?,
                    bot_id: row.get(1)?,
                    pattern: Pattern {
                        request: row.get(2)?,
                        trigger_state: row.get(3)?,
                        result_state: row.get(4)?,
                        response: row.get(5)?,
                        remote_message: row.get(6)?,
                    },
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(rows)
    }

    /// Delete a pattern row
    ///
    /// # Errors
    ///
    /// Returns error if the row does not exist or the database operation fails
    pub fn delete(&self, id: i64) -> Result<()> {
        let conn = connection(&self.pool)?;

        let deleted = conn
            .execute("DELETE FROM bot_patterns WHERE id = ?1", [id])
            .map_err(|e| Error::Database(e.to_string()))?;

        if deleted == 0 {
            return Err(Error::NotFound(format!("pattern {id}")));
        }
        Ok(())
    }
}

impl PatternStore for PatternRepo {
    fn patterns(&self, bot_id: &str) -> Result<Vec<Pattern>> {
        Ok(self.list(bot_id)?.into_iter().map(|row| row.pattern).collect())
    }
}
