//! Bot membership repository

use rusqlite::OptionalExtension;

use super::{DbPool, connection};
use crate::bots::{Bot, BotDirectory};
use crate::{Error, Result};

/// Bot membership repository
#[derive(Clone)]
pub struct BotRepo {
    pool: DbPool,
}

impl BotRepo {
    /// Create a new bot repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Add a bot to a group, replacing an existing membership
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add(&self, group_id: &str, bot: &Bot) -> Result<()> {
        let conn = connection(&self.pool)?;

        conn.execute(
            "INSERT INTO bots (user_id, group_id, user_name, bot_token, callback_url)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(group_id, user_id) DO UPDATE SET
                user_name = excluded.user_name,
                bot_token = excluded.bot_token,
                callback_url = excluded.callback_url",
            rusqlite::params![
                bot.user_id,
                group_id,
                bot.user_name,
                bot.bot_token,
                bot.callback_url
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(group = %group_id, bot = %bot.user_id, "bot added to group");
        Ok(())
    }

    /// Find a bot by user ID in any group
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, user_id: &str) -> Result<Option<Bot>> {
        let conn = connection(&self.pool)?;

        conn.query_row(
            "SELECT user_id, user_name, bot_token, callback_url
             FROM bots WHERE user_id = ?1 LIMIT 1",
            [user_id],
            row_to_bot,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Remove a bot from a group
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn remove(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let conn = connection(&self.pool)?;

        let removed = conn
            .execute(
                "DELETE FROM bots WHERE group_id = ?1 AND user_id = ?2",
                [group_id, user_id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(removed > 0)
    }
}

impl BotDirectory for BotRepo {
    fn bot_followers(&self, group_id: &str) -> Result<Vec<Bot>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn
            .prepare(
                "SELECT user_id, user_name, bot_token, callback_url
                 FROM bots WHERE group_id = ?1 ORDER BY created_at, user_id",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let bots = stmt
            .query_map([group_id], row_to_bot)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(bots)
    }
}

fn row_to_bot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bot> {
    Ok(Bot {
        user_id: row.get(0)?,
        user_name: row.get(1)?,
        bot_token: row.get(2)?,
        callback_url: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn bot(id: &str, name: &str, callback: Option<&str>) -> Bot {
        Bot {
            user_id: id.to_string(),
            user_name: name.to_string(),
            bot_token: format!("{name}-token"),
            callback_url: callback.map(String::from),
        }
    }

    #[test]
    fn test_followers_scoped_to_group() {
        let repo = BotRepo::new(init_memory().unwrap());
        repo.add("g1", &bot("b1", "echo", None)).unwrap();
        repo.add("g1", &bot("b2", "relay", Some("http://cb.local"))).unwrap();
        repo.add("g2", &bot("b3", "other", None)).unwrap();

        let followers = repo.bot_followers("g1").unwrap();
        assert_eq!(followers.len(), 2);
        assert!(followers.iter().any(|b| b.user_name == "relay" && b.is_remote()));

        assert!(repo.bot_followers("missing").unwrap().is_empty());
    }

    #[test]
    fn test_add_replaces_membership() {
        let repo = BotRepo::new(init_memory().unwrap());
        repo.add("g1", &bot("b1", "echo", None)).unwrap();
        repo.add("g1", &bot("b1", "echo", Some("http://cb.local"))).unwrap();

        let followers = repo.bot_followers("g1").unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].callback_url.as_deref(), Some("http://cb.local"));
    }

    #[test]
    fn test_find_and_remove() {
        let repo = BotRepo::new(init_memory().unwrap());
        repo.add("g1", &bot("b1", "echo", None)).unwrap();

        assert_eq!(repo.find("b1").unwrap().unwrap().user_name, "echo");
        assert!(repo.remove("g1", "b1").unwrap());
        assert!(!repo.remove("g1", "b1").unwrap());
        assert!(repo.find("b1").unwrap().is_none());
    }
}
