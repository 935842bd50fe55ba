//! Bot engine types

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Variable bound to the acting user's name in every match
pub const USER_NAME: &str = "USER_NAME";

/// Variable bound to the callback response body after dispatch
pub const REMOTE_RESPONSE: &str = "REMOTE_RESPONSE";

/// State token used when a bot has no stored state for the session
pub const DEFAULT_STATE: &str = "0";

/// A group member with the chat bot role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    /// Member user ID
    pub user_id: String,
    /// Display name, used for `@name` mentions
    pub user_name: String,
    /// Shared secret for callback authentication
    pub bot_token: String,
    /// Callback URL (absent or empty for local-only bots)
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl Bot {
    /// Callback URL if the bot forwards messages
    #[must_use]
    pub fn callback(&self) -> Option<&str> {
        self.callback_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether the bot has a remote callback
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.callback().is_some()
    }
}

/// One row of a bot's pattern table
///
/// Every field is a template; empty means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    /// Request template matched against the message segment
    pub request: String,
    /// State the bot must be in (empty matches any state)
    #[serde(default)]
    pub trigger_state: String,
    /// Next state after a match
    #[serde(default)]
    pub result_state: String,
    /// Reply text
    #[serde(default)]
    pub response: String,
    /// Payload forwarded to the bot callback
    #[serde(default)]
    pub remote_message: String,
}

/// Per-session conversation state, keyed by bot ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationState(BTreeMap<String, String>);

impl ConversationState {
    /// Create an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a bot, `"0"` if never set
    #[must_use]
    pub fn state_for(&self, bot_id: &str) -> &str {
        self.0.get(bot_id).map_or(DEFAULT_STATE, String::as_str)
    }

    /// Store the next state for a bot; empty values reset to `"0"`
    pub fn set(&mut self, bot_id: &str, value: &str) {
        let value = if value.is_empty() { DEFAULT_STATE } else { value };
        self.0.insert(bot_id.to_string(), value.to_string());
    }

    /// Number of bots with stored state
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no bot has stored state yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(bot_id, state)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A post submitted to a group, as seen by the engine
#[derive(Debug, Clone)]
pub struct IncomingPost {
    /// Raw post text
    pub text: String,
    /// Group the post belongs to
    pub group_id: String,
    /// Thread that replies attach to
    pub thread_id: String,
    /// Session of the posting user
    pub session_id: String,
    /// Thread title
    pub title: String,
    /// Posting user's display name
    pub user_name: String,
}

/// Pattern selected for a mention, with captured variables
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// The matched pattern
    pub pattern: Pattern,
    /// Captured placeholders plus reserved variables
    pub variables: HashMap<String, String>,
}

/// A mentioned bot together with its match
#[derive(Debug, Clone)]
pub struct BotMatch {
    /// The mentioned bot
    pub bot: Bot,
    /// Raw message segment from the post
    pub segment: String,
    /// Selected pattern and variables
    pub result: MatchResult,
}

/// A reply post to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub parent_id: String,
    pub group_id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
}

/// A reply the engine persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Bot that replied
    pub bot_id: String,
    /// ID assigned by the post store
    pub post_id: String,
    /// Reply body
    pub body: String,
}

/// Result of one engine run
#[derive(Debug, Clone, Default)]
pub struct EngineOutcome {
    /// Conversation state after the run
    pub state: ConversationState,
    /// Replies posted, in mention order
    pub replies: Vec<Reply>,
}
