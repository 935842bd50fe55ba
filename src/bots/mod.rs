//! Group chat-bot response engine
//!
//! Bots are group members that answer `@botname <message>` mentions. Each
//! bot owns an ordered pattern table; the first pattern whose request
//! matches the message and whose trigger state matches the conversation
//! state produces the reply, optionally after forwarding the message to the
//! bot's HTTP callback.
//!
//! Storage is reached only through the collaborator traits below; the
//! [`crate::db`] module provides `SQLite` implementations.

pub mod auth;
mod cache;
mod compose;
mod dispatch;
mod engine;
mod mention;
mod pattern;
pub mod template;
mod types;

pub use cache::PatternCache;
pub use compose::compose;
pub use dispatch::{
    BatchHttpClient, OutboundRequest, RemotePayload, ReqwestBatchClient, build_requests, dispatch,
};
pub use engine::BotEngine;
pub use mention::{Mention, scan};
pub use pattern::{CompiledPattern, PatternError, compile_all, match_patterns};
pub use types::{
    Bot, BotMatch, ConversationState, DEFAULT_STATE, EngineOutcome, IncomingPost, MatchResult,
    NewPost, Pattern, REMOTE_RESPONSE, Reply, USER_NAME,
};

use crate::Result;

/// Source of a group's bot followers
pub trait BotDirectory: Send + Sync {
    /// Bots following a group, with token and callback fields
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read
    fn bot_followers(&self, group_id: &str) -> Result<Vec<Bot>>;
}

/// Source of bot pattern tables
pub trait PatternStore: Send + Sync {
    /// A bot's patterns in table order
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be read
    fn patterns(&self, bot_id: &str) -> Result<Vec<Pattern>>;
}

/// Thread post storage
pub trait PostStore: Send + Sync {
    /// Persist a post, returning its ID
    ///
    /// # Errors
    ///
    /// Returns error if the post cannot be saved
    fn create_post(&self, post: &NewPost) -> Result<String>;
}

/// Per-session conversation state storage
pub trait SessionStateStore: Send + Sync {
    /// Load a session's state (empty if none stored)
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be read
    fn conversation_state(&self, session_id: &str) -> Result<ConversationState>;

    /// Replace a session's state
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be saved
    fn set_conversation_state(&self, session_id: &str, state: &ConversationState) -> Result<()>;
}
