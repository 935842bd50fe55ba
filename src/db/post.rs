//! Thread post repository

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use super::{DbPool, connection, parse_datetime};
use crate::bots::{NewPost, PostStore};
use crate::{Error, Result};

/// A stored post
#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub parent_id: Option<String>,
    pub group_id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Post repository
#[derive(Clone)]
pub struct PostRepo {
    pool: DbPool,
}

impl PostRepo {
    /// Create a new post repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a post by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<Post>> {
        let conn = connection(&self.pool)?;

        conn.query_row(
            "SELECT id, parent_id, group_id, author_id, title, body, created_at
             FROM posts WHERE id = ?1",
            [id],
            row_to_post,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// List replies to a thread, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn replies(&self, parent_id: &str) -> Result<Vec<Post>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, group_id, author_id, title, body, created_at
                 FROM posts WHERE parent_id = ?1 ORDER BY created_at, rowid",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let posts = stmt
            .query_map([parent_id], row_to_post)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(posts)
    }
}

impl PostStore for PostRepo {
    fn create_post(&self, post: &NewPost) -> Result<String> {
        let conn = connection(&self.pool)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO posts (id, parent_id, group_id, author_id, title, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                &id,
                post.parent_id,
                post.group_id,
                post.author_id,
                post.title,
                post.body,
                &now
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(id)
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        group_id: row.get(2)?,
        author_id: row.get(3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn new_post(author: &str, body: &str) -> NewPost {
        NewPost {
            parent_id: "t1".to_string(),
            group_id: "g1".to_string(),
            author_id: author.to_string(),
            title: "Re: hello".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let repo = PostRepo::new(init_memory().unwrap());
        let id = repo.create_post(&new_post("b1", "hi there")).unwrap();

        let post = repo.get(&id).unwrap().unwrap();
        assert_eq!(post.parent_id.as_deref(), Some("t1"));
        assert_eq!(post.author_id, "b1");
        assert_eq!(post.body, "hi there");
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_replies_in_order() {
        let repo = PostRepo::new(init_memory().unwrap());
        repo.create_post(&new_post("b1", "one")).unwrap();
        repo.create_post(&new_post("b2", "two")).unwrap();

        let replies = repo.replies("t1").unwrap();
        let bodies: Vec<_> = replies.iter().map(|p| p.body.as_str()).collect();
        assert_eq!(bodies, vec!["one", "two"]);
    }
}
