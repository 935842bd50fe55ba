//! Reply composition and conversation state updates

use super::PostStore;
use super::template;
use super::types::{BotMatch, ConversationState, IncomingPost, NewPost, REMOTE_RESPONSE, Reply};

/// Interpolate replies for each match, update state and persist posts
///
/// `responses` is aligned with `matches`. Every match advances the bot's
/// state; a response that interpolates to empty text posts nothing. Post
/// store failures are logged and do not stop the remaining bots.
pub fn compose(
    matches: Vec<BotMatch>,
    responses: Vec<Option<String>>,
    post: &IncomingPost,
    posts: &dyn PostStore,
    state: &mut ConversationState,
    title_prefix: &str,
) -> Vec<Reply> {
    let mut replies = Vec::new();
    let mut responses = responses.into_iter();

    for m in matches {
        let BotMatch { bot, result, .. } = m;
        let mut variables = result.variables;

        if let Some(body) = responses.next().flatten() {
            variables.insert(REMOTE_RESPONSE.to_string(), body);
        }

        let next_state = template::interpolate(&result.pattern.result_state, &variables);
        state.set(&bot.user_id, &next_state);

        let body = template::interpolate(&result.pattern.response, &variables);
        if body.is_empty() {
            tracing::debug!(bot = %bot.user_id, "empty response, no reply posted");
            continue;
        }

        let new_post = NewPost {
            parent_id: post.thread_id.clone(),
            group_id: post.group_id.clone(),
            author_id: bot.user_id.clone(),
            title: format!("{title_prefix}{}", post.title),
            body,
        };

        match posts.create_post(&new_post) {
            Ok(post_id) => {
                tracing::info!(
                    bot = %bot.user_id,
                    thread = %post.thread_id,
                    post = %post_id,
                    "bot replied"
                );
                replies.push(Reply {
                    bot_id: bot.user_id,
                    post_id,
                    body: new_post.body,
                });
            }
            Err(e) => {
                tracing::warn!(
                    bot = %bot.user_id,
                    thread = %post.thread_id,
                    error = %e,
                    "failed to save bot reply"
                );
            }
        }
    }

    replies
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::bots::{Bot, MatchResult, Pattern, USER_NAME};
    use crate::{Error, Result};

    #[derive(Default)]
    struct MemoryPosts {
        posts: Mutex<Vec<NewPost>>,
        fail_for: Option<String>,
    }

    impl PostStore for MemoryPosts {
        fn create_post(&self, post: &NewPost) -> Result<String> {
            if self.fail_for.as_deref() == Some(post.author_id.as_str()) {
                return Err(Error::Database("disk full".to_string()));
            }
            let mut posts = self.posts.lock().unwrap();
            posts.push(post.clone());
            Ok(format!("post-{}", posts.len()))
        }
    }

    fn incoming() -> IncomingPost {
        IncomingPost {
            text: String::new(),
            group_id: "g1".to_string(),
            thread_id: "t1".to_string(),
            session_id: "s1".to_string(),
            title: "Weekly sync".to_string(),
            user_name: "alice".to_string(),
        }
    }

    fn bot_match(id: &str, response: &str, result_state: &str, vars: &[(&str, &str)]) -> BotMatch {
        let mut variables: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        variables.insert(USER_NAME.to_string(), "alice".to_string());
        BotMatch {
            bot: Bot {
                user_id: id.to_string(),
                user_name: id.to_string(),
                bot_token: "t".to_string(),
                callback_url: None,
            },
            segment: String::new(),
            result: MatchResult {
                pattern: Pattern {
                    request: String::new(),
                    result_state: result_state.to_string(),
                    response: response.to_string(),
                    ..Default::default()
                },
                variables,
            },
        }
    }

    #[test]
    fn test_reply_posted_to_thread() {
        let posts = MemoryPosts::default();
        let mut state = ConversationState::new();

        let replies = compose(
            vec![bot_match("echo", "You said: $msg", "", &[("msg", "hello world")])],
            vec![None],
            &incoming(),
            &posts,
            &mut state,
            "Re: ",
        );

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].body, "You said: hello world");

        let saved = posts.posts.lock().unwrap();
        assert_eq!(saved[0].parent_id, "t1");
        assert_eq!(saved[0].group_id, "g1");
        assert_eq!(saved[0].author_id, "echo");
        assert_eq!(saved[0].title, "Re: Weekly sync");
    }

    #[test]
    fn test_remote_response_bound() {
        let posts = MemoryPosts::default();
        let mut state = ConversationState::new();

        let replies = compose(
            vec![bot_match("relay", "Remote said: $REMOTE_RESPONSE", "", &[])],
            vec![Some("42".to_string())],
            &incoming(),
            &posts,
            &mut state,
            "Re: ",
        );

        assert_eq!(replies[0].body, "Remote said: 42");
    }

    #[test]
    fn test_missing_remote_response_still_posts() {
        let posts = MemoryPosts::default();
        let mut state = ConversationState::new();

        let replies = compose(
            vec![bot_match("relay", "Remote said: $REMOTE_RESPONSE", "", &[])],
            vec![None],
            &incoming(),
            &posts,
            &mut state,
            "Re: ",
        );

        assert_eq!(replies[0].body, "Remote said: ");
    }

    #[test]
    fn test_empty_response_updates_state_only() {
        let posts = MemoryPosts::default();
        let mut state = ConversationState::new();

        let replies = compose(
            vec![bot_match("quiz", "$REMOTE_RESPONSE", "asked-$n", &[("n", "3")])],
            vec![None],
            &incoming(),
            &posts,
            &mut state,
            "Re: ",
        );

        assert!(replies.is_empty());
        assert!(posts.posts.lock().unwrap().is_empty());
        assert_eq!(state.state_for("quiz"), "asked-3");
    }

    #[test]
    fn test_empty_result_state_resets_to_default() {
        let posts = MemoryPosts::default();
        let mut state = ConversationState::new();
        state.set("echo", "busy");

        compose(
            vec![bot_match("echo", "ok", "", &[])],
            vec![None],
            &incoming(),
            &posts,
            &mut state,
            "Re: ",
        );

        assert_eq!(state.state_for("echo"), "0");
    }

    #[test]
    fn test_store_failure_skips_only_that_bot() {
        let posts = MemoryPosts {
            fail_for: Some("first".to_string()),
            ..Default::default()
        };
        let mut state = ConversationState::new();

        let replies = compose(
            vec![
                bot_match("first", "one", "s1", &[]),
                bot_match("second", "two", "s2", &[]),
            ],
            vec![None, None],
            &incoming(),
            &posts,
            &mut state,
            "Re: ",
        );

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].bot_id, "second");
        assert_eq!(state.state_for("first"), "s1");
        assert_eq!(state.state_for("second"), "s2");
    }
}
