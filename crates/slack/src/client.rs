//! Slack Web API surface used by the bot.
//!
//! [`SlackApi`] is the seam the lifecycle talks to; [`SlackWebClient`] is the
//! `reqwest` implementation authenticated with the bot token.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::blocks::Block;

const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendMessageRequest {
    pub channel: String,
    #[serde(rename = "thread_ts", skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFileRequest {
    pub channel: String,
    pub thread: Option<String>,
    pub file: Vec<u8>,
    pub filename: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReactionRequest {
    pub channel: String,
    #[serde(rename = "name")]
    pub emoji: String,
    #[serde(rename = "timestamp")]
    pub message_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHandle {
    pub ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadHandle {
    pub file_id: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("{method} request failed: {message}")]
    Request { method: String, message: String },
    #[error("{method} error: {error}")]
    Api { method: String, error: String },
    #[error("{method} response missing `{field}`")]
    MissingField { method: String, field: &'static str },
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageHandle, SlackApiError>;
    async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadHandle, SlackApiError>;
    async fn add_reaction(&self, request: ReactionRequest) -> Result<(), SlackApiError>;
    async fn remove_reaction(&self, request: ReactionRequest) -> Result<(), SlackApiError>;
}

#[derive(Debug, Default, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompleteUploadBody<'a> {
    files: [CompletedFile<'a>; 1],
    channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CompletedFile<'a> {
    id: &'a str,
    title: &'a str,
}

#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    bot_token: SecretString,
    base_url: String,
}

impl std::fmt::Debug for SlackWebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, SLACK_API_BASE)
    }

    pub fn with_base_url(bot_token: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Opens a Socket Mode session and returns its WebSocket URL. Authenticated
    /// with the app-level token rather than the bot token.
    pub async fn connections_open(&self, app_token: &SecretString) -> Result<String, SlackApiError> {
        const METHOD: &str = "apps.connections.open";
        debug!(method = METHOD, "opening socket mode connection");
        let response = self
            .http
            .post(self.endpoint(METHOD))
            .bearer_auth(app_token.expose_secret())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|error| request_error(METHOD, error))?;

        let api_response = parse_response(METHOD, response).await?;
        api_response.url.ok_or_else(|| SlackApiError::MissingField { method: METHOD.to_owned(), field: "url" })
    }

    async fn call_bot_api<B>(&self, method: &str, body: &B) -> Result<SlackApiResponse, SlackApiError>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .http
            .post(self.endpoint(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| request_error(method, error))?;

        parse_response(method, response).await
    }

    async fn call_bot_form(
        &self,
        method: &str,
        form: &[(&str, String)],
    ) -> Result<SlackApiResponse, SlackApiError> {
        let response = self
            .http
            .post(self.endpoint(method))
            .bearer_auth(self.bot_token.expose_secret())
            .form(form)
            .send()
            .await
            .map_err(|error| request_error(method, error))?;

        parse_response(method, response).await
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageHandle, SlackApiError> {
        const METHOD: &str = "chat.postMessage";
        debug!(channel = %request.channel, thread_ts = ?request.thread, "posting message");
        let response = self.call_bot_api(METHOD, &request).await?;
        let ts = response
            .ts
            .ok_or_else(|| SlackApiError::MissingField { method: METHOD.to_owned(), field: "ts" })?;
        Ok(MessageHandle { ts })
    }

    async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadHandle, SlackApiError> {
        const GET_URL: &str = "files.getUploadURLExternal";
        const COMPLETE: &str = "files.completeUploadExternal";
        debug!(
            channel = %request.channel,
            filename = %request.filename,
            bytes = request.file.len(),
            "uploading file"
        );

        let ticket = self
            .call_bot_form(
                GET_URL,
                &[("filename", request.filename.clone()), ("length", request.file.len().to_string())],
            )
            .await?;
        let upload_url = ticket
            .upload_url
            .ok_or_else(|| SlackApiError::MissingField { method: GET_URL.to_owned(), field: "upload_url" })?;
        let file_id = ticket
            .file_id
            .ok_or_else(|| SlackApiError::MissingField { method: GET_URL.to_owned(), field: "file_id" })?;

        let upload = self
            .http
            .post(&upload_url)
            .body(request.file)
            .send()
            .await
            .map_err(|error| request_error("file upload", error))?;
        if !upload.status().is_success() {
            return Err(SlackApiError::Api {
                method: "file upload".to_owned(),
                error: format!("http status {}", upload.status()),
            });
        }

        let body = CompleteUploadBody {
            files: [CompletedFile { id: &file_id, title: &request.filename }],
            channel_id: &request.channel,
            thread_ts: request.thread.as_deref(),
        };
        self.call_bot_api(COMPLETE, &body).await?;

        Ok(UploadHandle { file_id })
    }

    async fn add_reaction(&self, request: ReactionRequest) -> Result<(), SlackApiError> {
        debug!(channel = %request.channel, ts = %request.message_id, name = %request.emoji, "adding reaction");
        self.call_bot_api("reactions.add", &request).await?;
        Ok(())
    }

    async fn remove_reaction(&self, request: ReactionRequest) -> Result<(), SlackApiError> {
        debug!(channel = %request.channel, ts = %request.message_id, name = %request.emoji, "removing reaction");
        self.call_bot_api("reactions.remove", &request).await?;
        Ok(())
    }
}

fn request_error(method: &str, error: reqwest::Error) -> SlackApiError {
    SlackApiError::Request { method: method.to_owned(), message: error.to_string() }
}

async fn parse_response(
    method: &str,
    response: reqwest::Response,
) -> Result<SlackApiResponse, SlackApiError> {
    let api_response: SlackApiResponse = response.json().await.map_err(|error| {
        SlackApiError::Request { method: method.to_owned(), message: format!("response parse failed: {error}") }
    })?;

    if !api_response.ok {
        let error = api_response.error.unwrap_or_else(|| "unknown".to_owned());
        warn!(method, error = %error, "slack api error");
        return Err(SlackApiError::Api { method: method.to_owned(), error });
    }

    Ok(api_response)
}

#[cfg(test)]
mod tests {
    use relaybot_core::BlockKind;
    use serde_json::json;

    use super::{ReactionRequest, SendMessageRequest, SlackApiError, SlackWebClient};
    use crate::blocks::markup_message;

    #[test]
    fn plain_text_request_omits_blocks_and_thread() {
        let request = SendMessageRequest {
            channel: "C1".to_owned(),
            thread: None,
            text: Some("hi".to_owned()),
            blocks: None,
        };

        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({ "channel": "C1", "text": "hi" })
        );
    }

    #[test]
    fn threaded_block_request_uses_slack_field_names() {
        let template = markup_message("hi", BlockKind::Context);
        let request = SendMessageRequest {
            channel: "C1".to_owned(),
            thread: Some("1700000000.000100".to_owned()),
            text: Some(template.fallback_text),
            blocks: Some(template.blocks),
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["thread_ts"], "1700000000.000100");
        assert_eq!(value["blocks"][0]["type"], "context");
        assert_eq!(value["blocks"][0]["elements"][0], json!({ "type": "mrkdwn", "text": "hi" }));
    }

    #[test]
    fn reaction_request_maps_to_reactions_api_fields() {
        let request = ReactionRequest {
            channel: "C1".to_owned(),
            emoji: "thinking_face".to_owned(),
            message_id: "1700000000.000100".to_owned(),
        };

        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({ "channel": "C1", "name": "thinking_face", "timestamp": "1700000000.000100" })
        );
    }

    #[test]
    fn api_errors_name_the_method() {
        let error =
            SlackApiError::Api { method: "reactions.add".to_owned(), error: "already_reacted".to_owned() };
        assert_eq!(error.to_string(), "reactions.add error: already_reacted");
    }

    #[test]
    fn debug_output_does_not_leak_the_token() {
        let client = SlackWebClient::with_base_url("xoxb-secret".to_owned().into(), "http://localhost/api/");
        let debug = format!("{client:?}");
        assert!(debug.contains("http://localhost/api"));
        assert!(!debug.contains("xoxb-secret"));
    }
}
