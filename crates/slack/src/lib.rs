//! Slack integration for relaybot: Socket Mode in, Web API out.
//!
//! - **Socket Mode** (`socket`, `websocket`) - WebSocket session with Slack (no public URL needed)
//! - **Events** (`events`) - direct messages and app mentions normalized into `IncomingMessage`
//! - **Lifecycle** (`lifecycle`) - reactions, handler invocation and apology replies per message
//! - **Outbound** (`outbound`, `blocks`) - text, Block Kit mrkdwn and file uploads
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to `message.im` and `app_mention`
//! 3. Grant `chat:write`, `reactions:write` and `files:write`
//! 4. Set env vars: `RELAYBOT_SLACK_APP_TOKEN`, `RELAYBOT_SLACK_BOT_TOKEN`, `RELAYBOT_SLACK_BOT_USER_ID`
//!
//! # Architecture
//!
//! ```text
//! Socket Mode → EventRouter → EventNormalizer → MessageProcessor → CommandHook
//!                                                     ↓
//!                              Slack Web API ← OutboundDispatcher
//! ```
//!
//! # Key Types
//!
//! - `SlackBot` - configure, register a hook, listen
//! - `SocketModeRunner` - WebSocket event loop with reconnection logic
//! - `MessageProcessor` - per-message lifecycle
//! - `SlackApi` - trait over the Web API calls the bot makes

pub mod blocks;
pub mod bot;
pub mod client;
pub mod events;
pub mod hook;
pub mod lifecycle;
pub mod outbound;
pub mod socket;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

pub use bot::{BotSettings, ListenOptions, SlackBot};
pub use client::{SlackApi, SlackApiError, SlackWebClient};
pub use hook::{CommandHook, HookMode, MessageHandler};
pub use lifecycle::{MessageProcessor, ProcessError};
