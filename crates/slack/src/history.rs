use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use galley_core::domain::{DateRange, RawMessage};
use galley_core::errors::FetchError;
use galley_core::pipeline::HistoryFetcher;
use tracing::{debug, warn};

use crate::client::{HistoryMessage, HistoryPage, SlackApiError, SlackClient};

/// Slack error codes that mean the bot cannot read the channel, as opposed
/// to a transient transport problem.
const ACCESS_ERRORS: [&str; 4] =
    ["not_in_channel", "channel_not_found", "access_denied", "missing_scope"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Pageable history source. `SlackClient` is the real implementation; tests
/// script one.
#[async_trait]
pub trait HistoryApi: Send + Sync {
    async fn history_page(
        &self,
        channel_id: &str,
        oldest: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, SlackApiError>;

    async fn user_name(&self, user_id: &str) -> Result<Option<String>, SlackApiError>;
}

#[async_trait]
impl HistoryApi for SlackClient {
    async fn history_page(
        &self,
        channel_id: &str,
        oldest: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, SlackApiError> {
        self.conversations_history(channel_id, oldest, cursor).await
    }

    async fn user_name(&self, user_id: &str) -> Result<Option<String>, SlackApiError> {
        self.users_info(user_id).await
    }
}

/// Fetches the monitored channel's history for a date range, following
/// pagination cursors and retrying transient failures with backoff. The
/// returned sequence is chronologically ascending and already excludes
/// bot-authored and text-less messages.
pub struct SlackHistoryFetcher<A = SlackClient> {
    api: A,
    channel_id: String,
    retry: RetryPolicy,
}

impl<A> SlackHistoryFetcher<A>
where
    A: HistoryApi,
{
    pub fn new(api: A, channel_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self { api, channel_id: channel_id.into(), retry }
    }

    async fn page_with_retry(
        &self,
        oldest: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.api.history_page(&self.channel_id, oldest, cursor).await {
                Ok(page) => return Ok(page),
                Err(SlackApiError::Api(code)) if ACCESS_ERRORS.contains(&code.as_str()) => {
                    return Err(FetchError::Access { channel_id: self.channel_id.clone() });
                }
                Err(error) => {
                    if attempt >= self.retry.max_retries {
                        return Err(FetchError::Transport(error.to_string()));
                    }
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %error,
                        "history page fetch failed; retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Swaps each author id for the user's real name, looked up once per
    /// distinct author. A failed or empty lookup keeps the raw id, so name
    /// resolution can never fail a fetch.
    async fn resolve_authors(&self, messages: &mut [RawMessage]) {
        let mut names: HashMap<String, String> = HashMap::new();
        for message in messages.iter_mut() {
            if !names.contains_key(&message.author) {
                let resolved = match self.api.user_name(&message.author).await {
                    Ok(Some(name)) => name,
                    Ok(None) => message.author.clone(),
                    Err(error) => {
                        warn!(
                            user_id = %message.author,
                            error = %error,
                            "user name lookup failed; keeping the id"
                        );
                        message.author.clone()
                    }
                };
                names.insert(message.author.clone(), resolved);
            }
            if let Some(name) = names.get(&message.author) {
                message.author = name.clone();
            }
        }
    }
}

#[async_trait]
impl<A> HistoryFetcher for SlackHistoryFetcher<A>
where
    A: HistoryApi,
{
    async fn fetch(&self, range: &DateRange) -> Result<Vec<RawMessage>, FetchError> {
        let oldest = format!("{}.000000", range.start_of_day_utc().timestamp());
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.page_with_retry(&oldest, cursor.as_deref()).await?;
            pages += 1;
            messages.extend(page.messages.into_iter().filter_map(to_raw_message));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        self.resolve_authors(&mut messages).await;

        // Slack returns newest-first; the pipeline wants one chronologically
        // ascending sequence.
        messages.sort_by(|a, b| a.posted_at.cmp(&b.posted_at));
        debug!(pages, message_count = messages.len(), "channel history assembled");
        Ok(messages)
    }
}

fn to_raw_message(message: HistoryMessage) -> Option<RawMessage> {
    if message.bot_id.is_some() || message.subtype.is_some() {
        return None;
    }
    let author = message.user?;
    let text = message.text.unwrap_or_default();
    if text.trim().is_empty() {
        return None;
    }
    let posted_at = parse_slack_ts(&message.ts)?;
    Some(RawMessage { id: message.ts, author, text, posted_at })
}

fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let seconds = ts.split('.').next()?.parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0)
}
