use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IncomingMessage {
    pub message_id: String,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Platform text exactly as received.
    pub raw: String,
    /// Text with the bot mention removed and surrounding whitespace trimmed.
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageData {
    Text(String),
    Binary(Vec<u8>),
}

impl MessageData {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Binary(bytes) => bytes.is_empty(),
        }
    }
}

impl From<String> for MessageData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MessageData {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for MessageData {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Mrkdwn,
    Markdown,
    Image,
    File,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Mrkdwn => "mrkdwn",
            Self::Markdown => "markdown",
            Self::Image => "image",
            Self::File => "file",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseKindError {
    #[error("unsupported data type `{0}` (expected text|mrkdwn|markdown|image|file)")]
    DataType(String),
    #[error("unsupported block kind `{0}` (expected section|context)")]
    BlockKind(String),
}

impl FromStr for DataType {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "mrkdwn" => Ok(Self::Mrkdwn),
            "markdown" => Ok(Self::Markdown),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            other => Err(ParseKindError::DataType(other.to_owned())),
        }
    }
}

/// Layout used when markup content is rendered as a Block Kit block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Section,
    #[default]
    Context,
}

impl FromStr for BlockKind {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "section" => Ok(Self::Section),
            "context" => Ok(Self::Context),
            other => Err(ParseKindError::BlockKind(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub data: MessageData,
    pub data_type: DataType,
    pub block: Option<BlockKind>,
}

impl OutgoingMessage {
    pub fn text(
        channel_id: impl Into<String>,
        thread_id: Option<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_id,
            data: MessageData::Text(text.into()),
            data_type: DataType::Text,
            block: None,
        }
    }
}

pub const DEFAULT_LOADING_REACTION: &str = "thinking_face";
pub const DEFAULT_SUCCESS_REACTION: &str = "white_check_mark";
pub const DEFAULT_FAILED_REACTION: &str = "x";

/// Emoji names applied to the source message while it is processed. `None`
/// skips that step entirely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reactions {
    pub loading: Option<String>,
    pub success: Option<String>,
    pub failed: Option<String>,
}

impl Default for Reactions {
    fn default() -> Self {
        Self {
            loading: Some(DEFAULT_LOADING_REACTION.to_owned()),
            success: Some(DEFAULT_SUCCESS_REACTION.to_owned()),
            failed: Some(DEFAULT_FAILED_REACTION.to_owned()),
        }
    }
}

impl Reactions {
    pub fn none() -> Self {
        Self { loading: None, success: None, failed: None }
    }
}

/// Normalizes a user supplied emoji token (`:X:`, ` x `) to the bare name the
/// reactions API expects. Empty tokens and `none` disable the reaction.
pub fn normalize_reaction_token(reaction: &str) -> Option<String> {
    let normalized = reaction.trim().trim_matches(':').trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized == "none" {
        None
    } else {
        Some(normalized)
    }
}
