//! Maps Slack Events API payloads onto [`IncomingMessage`] records.
//!
//! Each supported event kind is one entry in a table pairing a predicate with a
//! normalizer. Only kinds enabled on the [`EventNormalizer`] are consulted.

use relaybot_core::IncomingMessage;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::lifecycle::ProcessError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    DirectMessage,
    Mention,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectMessage => "direct_message",
            Self::Mention => "mention",
        }
    }
}

/// The subset of a Slack `message` / `app_mention` event the bot reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlackMessageEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("events_api payload has no `event` object")]
    MissingEvent,
    #[error("malformed event payload: {0}")]
    Malformed(String),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

struct NormalizerEntry {
    kind: EventKind,
    matches: fn(&SlackMessageEvent) -> bool,
    normalize: fn(&SlackMessageEvent, &str) -> Option<IncomingMessage>,
}

const NORMALIZERS: &[NormalizerEntry] = &[
    NormalizerEntry {
        kind: EventKind::DirectMessage,
        matches: is_direct_message,
        normalize: normalize_direct_message,
    },
    NormalizerEntry { kind: EventKind::Mention, matches: is_mention, normalize: normalize_mention },
];

/// Edits and deletions describe an earlier message rather than a new one.
const IGNORED_MESSAGE_SUBTYPES: &[&str] = &["message_changed", "message_deleted"];

fn is_direct_message(event: &SlackMessageEvent) -> bool {
    event.event_type == "message"
        && event.channel_type.as_deref() == Some("im")
        && !event.subtype.as_deref().is_some_and(|subtype| IGNORED_MESSAGE_SUBTYPES.contains(&subtype))
}

fn is_mention(event: &SlackMessageEvent) -> bool {
    event.event_type == "app_mention"
}

fn normalize_direct_message(event: &SlackMessageEvent, _bot_user_id: &str) -> Option<IncomingMessage> {
    let text = event.text.as_deref().filter(|text| !text.is_empty())?;
    Some(IncomingMessage {
        message_id: event.ts.clone(),
        channel_id: event.channel.clone(),
        thread_id: event.thread_ts.clone(),
        raw: text.to_owned(),
        message: text.to_owned(),
    })
}

fn normalize_mention(event: &SlackMessageEvent, bot_user_id: &str) -> Option<IncomingMessage> {
    let text = event.text.as_deref()?;
    let tag = format!("<@{bot_user_id}>");
    if !text.contains(&tag) {
        return None;
    }

    Some(IncomingMessage {
        message_id: event.ts.clone(),
        channel_id: event.channel.clone(),
        thread_id: event.thread_ts.clone(),
        raw: text.to_owned(),
        message: text.replacen(&tag, "", 1).trim().to_owned(),
    })
}

#[derive(Clone, Debug)]
pub struct EventNormalizer {
    bot_user_id: String,
    enabled: Vec<EventKind>,
}

impl EventNormalizer {
    pub fn new(bot_user_id: impl Into<String>, enabled: Vec<EventKind>) -> Self {
        Self { bot_user_id: bot_user_id.into(), enabled }
    }

    /// Reads the `event` object out of an `events_api` envelope payload.
    pub fn normalize_payload(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Option<IncomingMessage>, DispatchError> {
        let event = payload.get("event").ok_or(DispatchError::MissingEvent)?;
        let event = SlackMessageEvent::deserialize(event)
            .map_err(|error| DispatchError::Malformed(error.to_string()))?;
        Ok(self.normalize(&event).map(|(_, message)| message))
    }

    pub fn normalize(&self, event: &SlackMessageEvent) -> Option<(EventKind, IncomingMessage)> {
        if event.user.as_deref() == Some(self.bot_user_id.as_str()) {
            debug!(event_type = %event.event_type, ts = %event.ts, "ignoring event authored by the bot");
            return None;
        }

        let entry = NORMALIZERS
            .iter()
            .filter(|entry| self.enabled.contains(&entry.kind))
            .find(|entry| (entry.matches)(event))?;

        let Some(message) = (entry.normalize)(event, &self.bot_user_id) else {
            debug!(
                kind = entry.kind.as_str(),
                ts = %event.ts,
                "event matched but carried nothing to process"
            );
            return None;
        };

        info!(
            event_name = "ingress.slack.message_normalized",
            kind = entry.kind.as_str(),
            message_id = %message.message_id,
            channel_id = %message.channel_id,
            thread_id = message.thread_id.as_deref().unwrap_or("none"),
            "normalized slack event"
        );
        Some((entry.kind, message))
    }
}
