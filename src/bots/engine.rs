//! Bot engine entry point
//!
//! Runs once per submitted post: scan mentions, match each mentioned bot's
//! pattern table against the state snapshot, forward to callbacks in one
//! concurrent batch, then compose replies and the next state.

use std::sync::Arc;

use chrono::Utc;

use super::cache::PatternCache;
use super::compose::compose;
use super::dispatch::{BatchHttpClient, dispatch};
use super::mention::scan;
use super::pattern::match_patterns;
use super::types::{BotMatch, ConversationState, EngineOutcome, IncomingPost, Reply};
use super::{BotDirectory, PatternStore, PostStore, SessionStateStore};
use crate::Result;
use crate::config::EngineConfig;

/// Group chat-bot response engine
pub struct BotEngine {
    directory: Arc<dyn BotDirectory>,
    patterns: Arc<dyn PatternStore>,
    posts: Arc<dyn PostStore>,
    http: Arc<dyn BatchHttpClient>,
    cache: PatternCache,
    config: EngineConfig,
}

impl BotEngine {
    /// Create an engine over its collaborators
    #[must_use]
    pub fn new(
        directory: Arc<dyn BotDirectory>,
        patterns: Arc<dyn PatternStore>,
        posts: Arc<dyn PostStore>,
        http: Arc<dyn BatchHttpClient>,
        config: EngineConfig,
    ) -> Self {
        let cache = PatternCache::new(config.pattern_cache_capacity, config.pattern_cache_ttl);
        Self {
            directory,
            patterns,
            posts,
            http,
            cache,
            config,
        }
    }

    /// Compiled pattern cache, for hosts that edit pattern tables
    #[must_use]
    pub const fn cache(&self) -> &PatternCache {
        &self.cache
    }

    /// Respond to a post given the session's conversation state
    ///
    /// Matching reads `state` as passed in; updates from this post go to the
    /// returned state, so two mentions of one bot in the same post both see
    /// the state from before the post.
    ///
    /// # Errors
    ///
    /// Returns error if the group's bot followers cannot be loaded. Pattern
    /// loading, callback and post store failures only affect the bot involved.
    pub async fn respond(
        &self,
        post: &IncomingPost,
        state: ConversationState,
    ) -> Result<EngineOutcome> {
        if !post.text.contains('@') {
            return Ok(EngineOutcome {
                state,
                replies: Vec::new(),
            });
        }

        let followers = self.directory.bot_followers(&post.group_id)?;
        if followers.is_empty() {
            return Ok(EngineOutcome {
                state,
                replies: Vec::new(),
            });
        }

        let matches = self.match_mentions(post, &followers, &state);
        if matches.is_empty() {
            return Ok(EngineOutcome {
                state,
                replies: Vec::new(),
            });
        }

        let responses = dispatch(
            self.http.as_ref(),
            &matches,
            self.config.callback_timeout,
            Utc::now().timestamp(),
        )
        .await;

        let mut next = state;
        let replies = compose(
            matches,
            responses,
            post,
            self.posts.as_ref(),
            &mut next,
            &self.config.reply_title_prefix,
        );

        Ok(EngineOutcome {
            state: next,
            replies,
        })
    }

    /// Respond to a post, loading and saving state through `sessions`
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be loaded or saved, or if
    /// [`BotEngine::respond`] fails
    pub async fn handle_post(
        &self,
        post: &IncomingPost,
        sessions: &dyn SessionStateStore,
    ) -> Result<Vec<Reply>> {
        let state = sessions.conversation_state(&post.session_id)?;
        let outcome = self.respond(post, state).await?;
        sessions.set_conversation_state(&post.session_id, &outcome.state)?;
        Ok(outcome.replies)
    }

    /// Find the matching pattern for each mentioned bot, in mention order
    fn match_mentions(
        &self,
        post: &IncomingPost,
        followers: &[super::Bot],
        state: &ConversationState,
    ) -> Vec<BotMatch> {
        let mut matches = Vec::new();

        for mention in scan(&post.text, followers) {
            let Some(bot) = mention.bot else {
                continue;
            };

            let table = match self.cache.get_or_load(&bot.user_id, self.patterns.as_ref()) {
                Ok(table) => table,
                Err(e) => {
                    tracing::warn!(
                        bot = %bot.user_id,
                        error = %e,
                        "failed to load bot patterns"
                    );
                    continue;
                }
            };

            let current = state.state_for(&bot.user_id);
            match match_patterns(&table, &mention.segment, current, &post.user_name) {
                Some(result) => {
                    tracing::debug!(
                        bot = %bot.user_id,
                        state = %current,
                        "bot pattern matched"
                    );
                    matches.push(BotMatch {
                        bot,
                        segment: mention.segment,
                        result,
                    });
                }
                None => {
                    tracing::debug!(
                        bot = %bot.user_id,
                        state = %current,
                        "no bot pattern matched"
                    );
                }
            }
        }

        matches
    }
}

impl std::fmt::Debug for BotEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
