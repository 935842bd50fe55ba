//! Concurrent forwarding of matched messages to bot callbacks

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::auth;
use super::template;
use super::types::BotMatch;
use crate::config::MAX_CALLBACK_TIMEOUT;
use crate::{Error, Result};

/// Form body posted to a bot callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePayload {
    /// Interpolated `remote_message` template
    pub remote_message: String,
    /// Raw message segment that matched
    pub post: String,
    /// Authentication tag, see [`auth::sign`]
    pub bot_token: String,
    /// Name of the bot being called
    pub bot_name: String,
}

/// One callback to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Index of the match this request belongs to
    pub slot: usize,
    /// Bot being called
    pub bot_id: String,
    /// Callback URL
    pub url: String,
    /// Form body
    pub payload: RemotePayload,
}

/// Parallel HTTP client with a single deadline per batch
#[async_trait]
pub trait BatchHttpClient: Send + Sync {
    /// Issue all requests concurrently
    ///
    /// Returns one entry per request, in request order: the response body,
    /// or `None` if the call failed or missed the deadline.
    async fn fetch_all(
        &self,
        requests: &[OutboundRequest],
        timeout: Duration,
    ) -> Vec<Option<String>>;
}

/// Build the callback requests for a batch of matches
///
/// Only matches whose `remote_message` interpolates to non-empty text and
/// whose bot has a callback URL produce a request.
#[must_use]
pub fn build_requests(matches: &[BotMatch], timestamp: i64) -> Vec<OutboundRequest> {
    matches
        .iter()
        .enumerate()
        .filter_map(|(slot, m)| {
            let remote_message =
                template::interpolate(&m.result.pattern.remote_message, &m.result.variables);
            if remote_message.is_empty() {
                return None;
            }

            let Some(url) = m.bot.callback() else {
                tracing::debug!(
                    bot = %m.bot.user_id,
                    "pattern forwards but bot has no callback, skipping"
                );
                return None;
            };

            Some(OutboundRequest {
                slot,
                bot_id: m.bot.user_id.clone(),
                url: url.to_string(),
                payload: RemotePayload {
                    remote_message,
                    post: m.segment.clone(),
                    bot_token: auth::sign(&m.bot.bot_token, timestamp, &m.segment),
                    bot_name: m.bot.user_name.clone(),
                },
            })
        })
        .collect()
}

/// Forward matches to their callbacks and collect responses
///
/// The result is aligned with `matches`; entries without a request, or whose
/// call failed, are `None`.
pub async fn dispatch(
    client: &dyn BatchHttpClient,
    matches: &[BotMatch],
    timeout: Duration,
    timestamp: i64,
) -> Vec<Option<String>> {
    let mut responses = vec![None; matches.len()];

    let requests = build_requests(matches, timestamp);
    if requests.is_empty() {
        return responses;
    }

    tracing::debug!(count = requests.len(), "dispatching bot callbacks");
    let bodies = client.fetch_all(&requests, timeout).await;

    for (request, body) in requests.iter().zip(bodies) {
        if body.is_none() {
            tracing::warn!(bot = %request.bot_id, "no response from bot callback");
        }
        if let Some(slot) = responses.get_mut(request.slot) {
            *slot = body;
        }
    }

    responses
}

/// [`BatchHttpClient`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestBatchClient {
    client: Client,
}

impl ReqwestBatchClient {
    /// Create a client with a per-request timeout and user agent
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()
            .map_err(Error::Http)?;

        Ok(Self { client })
    }

    /// Post one form body and read the response text
    async fn post_form(&self, request: &OutboundRequest) -> std::result::Result<String, String> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| format!("invalid URL: {e}"))?;
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(format!("unsupported scheme: {scheme}"));
        }

        let response = self
            .client
            .post(url)
            .form(&request.payload)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("callback returned {status}"));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read body: {e}"))?;

        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl BatchHttpClient for ReqwestBatchClient {
    async fn fetch_all(
        &self,
        requests: &[OutboundRequest],
        timeout: Duration,
    ) -> Vec<Option<String>> {
        let deadline = tokio::time::Instant::now() + timeout.min(MAX_CALLBACK_TIMEOUT);

        let calls = requests.iter().map(|request| async move {
            match tokio::time::timeout_at(deadline, self.post_form(request)).await {
                Ok(Ok(body)) => Some(body),
                Ok(Err(e)) => {
                    tracing::warn!(
                        bot = %request.bot_id,
                        url = %request.url,
                        error = %e,
                        "bot callback failed"
                    );
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        bot = %request.bot_id,
                        url = %request.url,
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "bot callback timed out"
                    );
                    None
                }
            }
        });

        futures::future::join_all(calls).await
    }
}
