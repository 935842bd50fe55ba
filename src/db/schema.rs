//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Bot members of groups
        CREATE TABLE IF NOT EXISTS bots (
            user_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            user_name TEXT NOT NULL,
            bot_token TEXT NOT NULL,
            callback_url TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (group_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_bots_user ON bots(user_id);

        -- Pattern tables, ordered by id
        CREATE TABLE IF NOT EXISTS bot_patterns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bot_id TEXT NOT NULL,
            request TEXT NOT NULL,
            trigger_state TEXT NOT NULL DEFAULT '',
            result_state TEXT NOT NULL DEFAULT '',
            response TEXT NOT NULL DEFAULT '',
            remote_message TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_bot_patterns_bot ON bot_patterns(bot_id, id);

        -- Thread posts
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            parent_id TEXT,
            group_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_parent ON posts(parent_id);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::debug!("migrated database to v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Conversation state per session, JSON map of bot id to state
        CREATE TABLE IF NOT EXISTS conversation_state (
            session_id TEXT PRIMARY KEY,
            state TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT NOT NULL
        );

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::debug!("migrated database to v2");
    Ok(())
}
