use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack transport failed: {0}")]
    Http(String),
    #[error("slack api returned error `{0}`")]
    Api(String),
}

impl From<reqwest::Error> for SlackApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

/// One page of channel history plus the cursor for the next one, if any.
#[derive(Clone, Debug, Default)]
pub struct HistoryPage {
    pub messages: Vec<HistoryMessage>,
    pub next_cursor: Option<String>,
}

/// Raw message shape from `conversations.history`. Fields are optional
/// because Slack omits them for bot posts, joins, and other subtypes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct HistoryMessage {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

/// Thin authenticated client over the Slack Web API.
#[derive(Clone, Debug)]
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackClient {
    pub fn new(bot_token: SecretString, timeout: Duration) -> Result<Self, SlackApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: DEFAULT_BASE_URL.to_owned(), bot_token })
    }

    /// Point the client at a different API root (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn conversations_history(
        &self,
        channel_id: &str,
        oldest: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, SlackApiError> {
        let mut query = vec![("channel", channel_id.to_owned()), ("oldest", oldest.to_owned())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_owned()));
        }

        let reply: HistoryReply = self
            .http
            .get(format!("{}/conversations.history", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&query)
            .send()
            .await?
            .json()
            .await?;

        if !reply.ok {
            return Err(SlackApiError::Api(reply.error.unwrap_or_else(|| "unknown".to_owned())));
        }

        let next_cursor = reply
            .response_metadata
            .and_then(|metadata| metadata.next_cursor)
            .filter(|cursor| !cursor.is_empty());

        Ok(HistoryPage { messages: reply.messages.unwrap_or_default(), next_cursor })
    }

    /// Resolves a user id to their real name, when Slack has one on file.
    pub async fn users_info(&self, user_id: &str) -> Result<Option<String>, SlackApiError> {
        let reply: UserInfoReply = self
            .http
            .get(format!("{}/users.info", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("user", user_id)])
            .send()
            .await?
            .json()
            .await?;

        if !reply.ok {
            return Err(SlackApiError::Api(reply.error.unwrap_or_else(|| "unknown".to_owned())));
        }
        Ok(reply
            .user
            .and_then(|user| user.real_name)
            .filter(|name| !name.trim().is_empty()))
    }

    /// Opens (or resumes) a DM conversation and returns its channel id.
    pub async fn conversations_open(&self, user_id: &str) -> Result<String, SlackApiError> {
        let reply: OpenReply = self
            .http
            .post(format!("{}/conversations.open", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&json!({ "users": user_id }))
            .send()
            .await?
            .json()
            .await?;

        if !reply.ok {
            return Err(SlackApiError::Api(reply.error.unwrap_or_else(|| "unknown".to_owned())));
        }
        reply
            .channel
            .map(|channel| channel.id)
            .ok_or_else(|| SlackApiError::Api("missing_channel".to_owned()))
    }

    /// First half of the external upload flow: reserve an upload slot.
    pub async fn get_upload_url(
        &self,
        filename: &str,
        length: usize,
    ) -> Result<UploadSlot, SlackApiError> {
        let reply: UploadUrlReply = self
            .http
            .post(format!("{}/files.getUploadURLExternal", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .form(&[("filename", filename.to_owned()), ("length", length.to_string())])
            .send()
            .await?
            .json()
            .await?;

        if !reply.ok {
            return Err(SlackApiError::Api(reply.error.unwrap_or_else(|| "unknown".to_owned())));
        }
        match (reply.upload_url, reply.file_id) {
            (Some(upload_url), Some(file_id)) => Ok(UploadSlot { upload_url, file_id }),
            _ => Err(SlackApiError::Api("missing_upload_url".to_owned())),
        }
    }

    /// Uploads the raw file bytes to the reserved slot.
    pub async fn post_file_content(
        &self,
        upload_url: &str,
        bytes: Vec<u8>,
    ) -> Result<(), SlackApiError> {
        let response = self.http.post(upload_url).body(bytes).send().await?;
        if !response.status().is_success() {
            return Err(SlackApiError::Http(format!(
                "file content upload returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Second half of the external upload flow: finalize and share the file.
    pub async fn complete_upload(
        &self,
        file_id: &str,
        title: &str,
        channel_id: &str,
    ) -> Result<(), SlackApiError> {
        let reply: CompleteReply = self
            .http
            .post(format!("{}/files.completeUploadExternal", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&json!({
                "files": [{ "id": file_id, "title": title }],
                "channel_id": channel_id,
            }))
            .send()
            .await?
            .json()
            .await?;

        if !reply.ok {
            return Err(SlackApiError::Api(reply.error.unwrap_or_else(|| "unknown".to_owned())));
        }
        Ok(())
    }

    /// Posts an arbitrary JSON payload to a slash-command `response_url`.
    pub async fn post_response(
        &self,
        response_url: &str,
        payload: &serde_json::Value,
    ) -> Result<(), SlackApiError> {
        let response = self.http.post(response_url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(SlackApiError::Http(format!(
                "response_url post returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct UploadSlot {
    pub upload_url: String,
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
struct HistoryReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Option<Vec<HistoryMessage>>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<OpenChannel>,
}

#[derive(Debug, Deserialize)]
struct OpenChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrlReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompleteReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}
