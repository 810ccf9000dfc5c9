//! The application-facing bot: configure, register one hook, listen.

use std::sync::Arc;

use async_trait::async_trait;
use relaybot_core::config::{AppConfig, ListenConfig};
use relaybot_core::Reactions;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::client::{SlackApi, SlackWebClient};
use crate::events::{DispatchError, EventKind, EventNormalizer};
use crate::hook::CommandHook;
use crate::lifecycle::MessageProcessor;
use crate::socket::{
    EnvelopeHandler, EnvelopeKind, ReconnectPolicy, SlackEnvelope, SocketError, SocketModeRunner,
    SocketTransport,
};
use crate::websocket::WebSocketTransport;

#[derive(Clone, Debug)]
pub struct BotSettings {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub bot_user_id: String,
    pub reactions: Reactions,
    pub reconnect: ReconnectPolicy,
}

impl BotSettings {
    pub fn new(
        app_token: SecretString,
        bot_token: SecretString,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self {
            app_token,
            bot_token,
            bot_user_id: bot_user_id.into(),
            reactions: Reactions::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_reactions(mut self, reactions: Reactions) -> Self {
        self.reactions = reactions;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            app_token: config.slack.app_token.clone(),
            bot_token: config.slack.bot_token.clone(),
            bot_user_id: config.slack.bot_user_id.clone(),
            reactions: config.reactions.clone(),
            reconnect: ReconnectPolicy {
                max_retries: config.socket.max_retries,
                base_delay_ms: config.socket.base_delay_ms,
                max_delay_ms: config.socket.max_delay_ms,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenOptions {
    pub command: bool,
    pub mention: bool,
    pub direct_message: bool,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self { command: false, mention: true, direct_message: true }
    }
}

impl From<&ListenConfig> for ListenOptions {
    fn from(config: &ListenConfig) -> Self {
        Self {
            command: config.command,
            mention: config.mention,
            direct_message: config.direct_message,
        }
    }
}

impl ListenOptions {
    pub fn event_kinds(&self) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        if self.direct_message {
            kinds.push(EventKind::DirectMessage);
        }
        if self.mention {
            kinds.push(EventKind::Mention);
        }
        kinds
    }
}

pub struct SlackBot {
    processor: Arc<MessageProcessor>,
    transport: Arc<dyn SocketTransport>,
    bot_user_id: String,
    reconnect: ReconnectPolicy,
}

impl SlackBot {
    pub fn new(settings: BotSettings) -> Self {
        let client = SlackWebClient::new(settings.bot_token);
        let transport = WebSocketTransport::new(client.clone(), settings.app_token);
        Self::with_parts(Arc::new(client), Arc::new(transport), settings.bot_user_id, settings.reactions)
            .with_reconnect_policy(settings.reconnect)
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(BotSettings::from_config(config))
    }

    /// Builds a bot over caller-supplied API and transport implementations.
    pub fn with_parts(
        api: Arc<dyn SlackApi>,
        transport: Arc<dyn SocketTransport>,
        bot_user_id: impl Into<String>,
        reactions: Reactions,
    ) -> Self {
        Self {
            processor: Arc::new(MessageProcessor::new(api, reactions)),
            transport,
            bot_user_id: bot_user_id.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_reconnect_policy(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn register_handler(&self, hook: CommandHook) {
        if self.processor.register_handler(hook).is_some() {
            info!("replaced previously registered message handler");
        }
    }

    pub fn has_handler(&self) -> bool {
        self.processor.has_handler()
    }

    pub fn processor(&self) -> Arc<MessageProcessor> {
        self.processor.clone()
    }

    /// Subscribes to the enabled event kinds and runs the Socket Mode session
    /// until it ends.
    pub async fn listen(&self, options: ListenOptions) -> Result<(), SocketError> {
        if options.command {
            warn!("slash command listening is not supported; `command` is ignored");
        }

        let kinds = options.event_kinds();
        if kinds.is_empty() {
            warn!("no event kinds enabled; not listening");
            return Ok(());
        }

        info!(
            bot_user_id = %self.bot_user_id,
            direct_message = options.direct_message,
            mention = options.mention,
            "starting slack listener"
        );

        let router = EventRouter {
            normalizer: EventNormalizer::new(self.bot_user_id.clone(), kinds),
            processor: self.processor.clone(),
        };
        SocketModeRunner::new(self.transport.clone(), Arc::new(router), self.reconnect.clone())
            .start()
            .await
    }
}

/// Feeds `events_api` envelopes through the normalizer into the lifecycle.
pub struct EventRouter {
    normalizer: EventNormalizer,
    processor: Arc<MessageProcessor>,
}

impl EventRouter {
    pub fn new(normalizer: EventNormalizer, processor: Arc<MessageProcessor>) -> Self {
        Self { normalizer, processor }
    }
}

#[async_trait]
impl EnvelopeHandler for EventRouter {
    async fn handle(&self, envelope: SlackEnvelope) -> Result<(), DispatchError> {
        if envelope.kind != EnvelopeKind::EventsApi {
            debug!(envelope_id = %envelope.envelope_id, kind = ?envelope.kind, "ignoring non-event envelope");
            return Ok(());
        }

        let Some(message) = self.normalizer.normalize_payload(&envelope.payload)? else {
            return Ok(());
        };

        self.processor.process_message(message).await?;
        Ok(())
    }
}
