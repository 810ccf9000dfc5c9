use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{
    MessageHandle, ReactionRequest, SendMessageRequest, SlackApi, SlackApiError, UploadFileRequest,
    UploadHandle,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiCall {
    Send(SendMessageRequest),
    Upload(UploadFileRequest),
    AddReaction(ReactionRequest),
    RemoveReaction(ReactionRequest),
}

impl ApiCall {
    /// Compact label used for ordering assertions: `+emoji`, `-emoji`, `send`,
    /// `upload`.
    pub fn label(&self) -> String {
        match self {
            Self::Send(_) => "send".to_owned(),
            Self::Upload(_) => "upload".to_owned(),
            Self::AddReaction(request) => format!("+{}", request.emoji),
            Self::RemoveReaction(request) => format!("-{}", request.emoji),
        }
    }
}

/// In-memory [`SlackApi`] that records every attempted call, including the
/// ones it is scripted to fail.
#[derive(Default)]
pub struct RecordingSlackApi {
    calls: Mutex<Vec<ApiCall>>,
    failing_send: Option<String>,
    failing_add: Vec<String>,
    failing_remove: Option<String>,
}

impl RecordingSlackApi {
    pub fn failing_sends(error: &str) -> Self {
        Self { failing_send: Some(error.to_owned()), ..Self::default() }
    }

    pub fn failing_add_reaction(emoji: &str) -> Self {
        Self { failing_add: vec![emoji.to_owned()], ..Self::default() }
    }

    pub fn with_failing_remove(mut self, error: &str) -> Self {
        self.failing_remove = Some(error.to_owned());
        self
    }

    pub async fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().await.clone()
    }

    pub async fn labels(&self) -> Vec<String> {
        self.calls.lock().await.iter().map(ApiCall::label).collect()
    }

    pub async fn sends(&self) -> Vec<SendMessageRequest> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                ApiCall::Send(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SlackApi for RecordingSlackApi {
    async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageHandle, SlackApiError> {
        self.calls.lock().await.push(ApiCall::Send(request));
        match &self.failing_send {
            Some(error) => {
                Err(SlackApiError::Api { method: "chat.postMessage".to_owned(), error: error.clone() })
            }
            None => Ok(MessageHandle { ts: "1700000000.000900".to_owned() }),
        }
    }

    async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadHandle, SlackApiError> {
        self.calls.lock().await.push(ApiCall::Upload(request));
        Ok(UploadHandle { file_id: "F1".to_owned() })
    }

    async fn add_reaction(&self, request: ReactionRequest) -> Result<(), SlackApiError> {
        let fails = self.failing_add.contains(&request.emoji);
        self.calls.lock().await.push(ApiCall::AddReaction(request));
        if fails {
            return Err(SlackApiError::Api {
                method: "reactions.add".to_owned(),
                error: "too_many_reactions".to_owned(),
            });
        }
        Ok(())
    }

    async fn remove_reaction(&self, request: ReactionRequest) -> Result<(), SlackApiError> {
        self.calls.lock().await.push(ApiCall::RemoveReaction(request));
        match &self.failing_remove {
            Some(error) => {
                Err(SlackApiError::Api { method: "reactions.remove".to_owned(), error: error.clone() })
            }
            None => Ok(()),
        }
    }
}
