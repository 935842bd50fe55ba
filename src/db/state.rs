//! Conversation state repository

use chrono::Utc;
use rusqlite::OptionalExtension;

use super::{DbPool, connection};
use crate::bots::{ConversationState, SessionStateStore};
use crate::{Error, Result};

/// Session-scoped conversation state, stored as JSON per session
#[derive(Clone)]
pub struct SessionStateRepo {
    pool: DbPool,
}

impl SessionStateRepo {
    /// Create a new state repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Forget a session's state, e.g. when the session ends
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn clear(&self, session_id: &str) -> Result<()> {
        let conn = connection(&self.pool)?;

        conn.execute(
            "DELETE FROM conversation_state WHERE session_id = ?1",
            [session_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}

impl SessionStateStore for SessionStateRepo {
    fn conversation_state(&self, session_id: &str) -> Result<ConversationState> {
        let conn = connection(&self.pool)?;

        let json: Option<String> = conn
            .query_row(
                "SELECT state FROM conversation_state WHERE session_id = ?1",
                [session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        let Some(json) = json else {
            return Ok(ConversationState::new());
        };

        match serde_json::from_str(&json) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(
                    session = %session_id,
                    error = %e,
                    "unreadable conversation state, starting fresh"
                );
                Ok(ConversationState::new())
            }
        }
    }

    fn set_conversation_state(&self, session_id: &str, state: &ConversationState) -> Result<()> {
        let conn = connection(&self.pool)?;
        let json = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO conversation_state (session_id, state, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at",
            rusqlite::params![session_id, json, now],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}
