//! Groupbot - chat-bot response engine for discussion groups
//!
//! Bot members of a group answer `@botname <message>` mentions in human
//! posts. The engine runs once per submitted post:
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌───────────────┐   ┌──────────────┐
//! │   Mention    │──▶│    Pattern    │──▶│    Remote     │──▶│    Reply     │
//! │   Scanner    │   │    Matcher    │   │   Dispatcher  │   │   Composer   │
//! └──────────────┘   └───────────────┘   └───────────────┘   └──────────────┘
//!   @name → bot       first match wins    parallel callbacks   state + post
//! ```
//!
//! Group membership, pattern tables, posts and session state are reached
//! through traits in [`bots`]; [`db`] implements them on `SQLite`.

pub mod bots;
pub mod config;
pub mod db;
pub mod error;

pub use bots::{
    BatchHttpClient, Bot, BotDirectory, BotEngine, ConversationState, EngineOutcome,
    IncomingPost, Pattern, PatternStore, PostStore, Reply, ReqwestBatchClient, SessionStateStore,
};
pub use config::{Config, EngineConfig};
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
