//! Shared test utilities

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use groupbot::bots::OutboundRequest;
use groupbot::db::{self, BotRepo, PatternRepo, PostRepo};
use groupbot::{BatchHttpClient, Bot, BotEngine, DbPool, EngineConfig, IncomingPost, Pattern};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Add a bot to a group
pub fn add_bot(db: &DbPool, group: &str, name: &str, callback: Option<&str>) -> Bot {
    let bot = Bot {
        user_id: format!("bot-{name}"),
        user_name: name.to_string(),
        bot_token: format!("{name}-secret"),
        callback_url: callback.map(String::from),
    };
    BotRepo::new(db.clone())
        .add(group, &bot)
        .expect("failed to add test bot");
    bot
}

/// Append a pattern to a bot's table
pub fn add_pattern(db: &DbPool, bot: &Bot, pattern: Pattern) {
    PatternRepo::new(db.clone())
        .add(&bot.user_id, &pattern)
        .expect("failed to add test pattern");
}

/// Build a pattern from request, response and optional extras
pub fn pattern(request: &str, response: &str) -> Pattern {
    Pattern {
        request: request.to_string(),
        response: response.to_string(),
        ..Default::default()
    }
}

/// A post in group `g1`, thread `t1`, session `s1` by alice
pub fn incoming(text: &str) -> IncomingPost {
    IncomingPost {
        text: text.to_string(),
        group_id: "g1".to_string(),
        thread_id: "t1".to_string(),
        session_id: "s1".to_string(),
        title: "Standup".to_string(),
        user_name: "alice".to_string(),
    }
}

/// Batch client returning canned bodies per URL and recording calls
#[derive(Default)]
pub struct MockHttp {
    responses: HashMap<String, Option<String>>,
    calls: Mutex<Vec<OutboundRequest>>,
    batches: Mutex<usize>,
}

impl MockHttp {
    /// Respond to `url` with `body` (`None` simulates a failure)
    #[must_use]
    pub fn with_response(mut self, url: &str, body: Option<&str>) -> Self {
        self.responses
            .insert(url.to_string(), body.map(String::from));
        self
    }

    /// Requests received so far
    pub fn calls(&self) -> Vec<OutboundRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `fetch_all` batches
    pub fn batches(&self) -> usize {
        *self.batches.lock().unwrap()
    }
}

#[async_trait]
impl BatchHttpClient for MockHttp {
    async fn fetch_all(
        &self,
        requests: &[OutboundRequest],
        _timeout: Duration,
    ) -> Vec<Option<String>> {
        *self.batches.lock().unwrap() += 1;
        self.calls.lock().unwrap().extend_from_slice(requests);
        requests
            .iter()
            .map(|r| self.responses.get(&r.url).cloned().flatten())
            .collect()
    }
}

/// Engine over the test database and a batch client
pub fn engine(db: &DbPool, http: Arc<dyn BatchHttpClient>) -> BotEngine {
    BotEngine::new(
        Arc::new(BotRepo::new(db.clone())),
        Arc::new(PatternRepo::new(db.clone())),
        Arc::new(PostRepo::new(db.clone())),
        http,
        EngineConfig::default(),
    )
}
