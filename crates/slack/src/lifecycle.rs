//! Per-message processing: loading reaction, handler invocation, reply,
//! success/failure reaction, apology on fault, and loading-reaction cleanup.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use relaybot_core::{IncomingMessage, MessageData, OutgoingMessage, Reactions};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::client::{ReactionRequest, SlackApi, SlackApiError};
use crate::hook::{CommandHook, HookMode};
use crate::outbound::OutboundDispatcher;

pub const ERROR_REPLY_PREFIX: &str = "Sorry, something went wrong.";

pub fn error_reply_text(detail: &str) -> String {
    format!("{ERROR_REPLY_PREFIX} ({detail})")
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("loading reaction `{emoji}` could not be added: {source}")]
    LoadingReaction {
        emoji: String,
        #[source]
        source: SlackApiError,
    },
    #[error("failure reaction `{emoji}` could not be added: {source}")]
    FailureReaction {
        emoji: String,
        #[source]
        source: SlackApiError,
    },
    #[error("error reply could not be delivered: {0}")]
    ErrorReply(#[source] SlackApiError),
    #[error("loading reaction `{emoji}` could not be removed: {source}")]
    Cleanup {
        emoji: String,
        #[source]
        source: SlackApiError,
    },
}

/// Anything raised inside the protected region. The display text is what ends
/// up in the apology reply.
#[derive(Debug, Error)]
enum HookFault {
    #[error(transparent)]
    Handler(anyhow::Error),
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Reply(SlackApiError),
    #[error(transparent)]
    SuccessReaction(SlackApiError),
}

/// Where a message came from; replies and reactions target it.
#[derive(Clone, Debug)]
struct Origin {
    channel_id: String,
    message_id: String,
    thread_id: Option<String>,
}

impl Origin {
    fn of(message: &IncomingMessage) -> Self {
        Self {
            channel_id: message.channel_id.clone(),
            message_id: message.message_id.clone(),
            thread_id: message.thread_id.clone(),
        }
    }

    fn reaction(&self, emoji: &str) -> ReactionRequest {
        ReactionRequest {
            channel: self.channel_id.clone(),
            emoji: emoji.to_owned(),
            message_id: self.message_id.clone(),
        }
    }
}

pub struct MessageProcessor {
    hook: RwLock<Option<Arc<CommandHook>>>,
    reactions: Reactions,
    api: Arc<dyn SlackApi>,
    dispatcher: OutboundDispatcher,
}

impl MessageProcessor {
    pub fn new(api: Arc<dyn SlackApi>, reactions: Reactions) -> Self {
        Self {
            hook: RwLock::new(None),
            reactions,
            dispatcher: OutboundDispatcher::new(api.clone()),
            api,
        }
    }

    /// Installs `hook` as the only handler, returning the one it replaced.
    pub fn register_handler(&self, hook: CommandHook) -> Option<Arc<CommandHook>> {
        let mut slot = self.hook.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(Arc::new(hook))
    }

    pub fn has_handler(&self) -> bool {
        self.hook.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn current_hook(&self) -> Option<Arc<CommandHook>> {
        self.hook.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub async fn process_message(&self, message: IncomingMessage) -> Result<(), ProcessError> {
        let payload = serde_json::to_string(&message).unwrap_or_default();
        info!(
            event_name = "message.received",
            message_id = %message.message_id,
            channel_id = %message.channel_id,
            thread_id = message.thread_id.as_deref().unwrap_or("none"),
            payload = %payload,
            "processing incoming message"
        );

        let Some(hook) = self.current_hook() else {
            debug!(message_id = %message.message_id, "no handler registered; message ignored");
            return Ok(());
        };

        let origin = Origin::of(&message);

        if let Some(emoji) = &self.reactions.loading {
            self.api.add_reaction(origin.reaction(emoji)).await.map_err(|source| {
                ProcessError::LoadingReaction { emoji: emoji.clone(), source }
            })?;
        }

        let recovery = match self.run_hook(&hook, message, &origin).await {
            Ok(()) => Ok(()),
            Err(fault) => self.recover(fault, &origin).await,
        };

        if let Some(emoji) = &self.reactions.loading {
            self.api
                .remove_reaction(origin.reaction(emoji))
                .await
                .map_err(|source| ProcessError::Cleanup { emoji: emoji.clone(), source })?;
        }

        recovery
    }

    async fn run_hook(
        &self,
        hook: &CommandHook,
        message: IncomingMessage,
        origin: &Origin,
    ) -> Result<(), HookFault> {
        match hook.mode {
            HookMode::Reply => {
                let reply = invoke(hook, message).await?;

                if let Some(data) = reply.filter(|data| !data.is_empty()) {
                    let outgoing = OutgoingMessage {
                        channel_id: origin.channel_id.clone(),
                        thread_id: origin.thread_id.clone(),
                        data,
                        data_type: hook.data_type,
                        block: hook.block,
                    };
                    self.dispatcher.post_message(outgoing).await.map_err(HookFault::Reply)?;
                }

                if let Some(emoji) = &self.reactions.success {
                    self.api
                        .add_reaction(origin.reaction(emoji))
                        .await
                        .map_err(HookFault::SuccessReaction)?;
                }
            }
            HookMode::FireAndForget => {
                invoke(hook, message).await?;
            }
        }

        Ok(())
    }

    async fn recover(&self, fault: HookFault, origin: &Origin) -> Result<(), ProcessError> {
        error!(
            event_name = "message.handler_failed",
            message_id = %origin.message_id,
            channel_id = %origin.channel_id,
            error = ?fault,
            "message handler failed"
        );

        if let Some(emoji) = &self.reactions.failed {
            self.api.add_reaction(origin.reaction(emoji)).await.map_err(|source| {
                ProcessError::FailureReaction { emoji: emoji.clone(), source }
            })?;
        }

        let apology = OutgoingMessage::text(
            origin.channel_id.clone(),
            origin.thread_id.clone(),
            error_reply_text(&fault.to_string()),
        );
        self.dispatcher.post_message(apology).await.map_err(ProcessError::ErrorReply)
    }
}

/// Runs the handler, turning a panic into a fault so cleanup still happens.
async fn invoke(hook: &CommandHook, message: IncomingMessage) -> Result<Option<MessageData>, HookFault> {
    match AssertUnwindSafe(hook.handler.handle(message)).catch_unwind().await {
        Ok(result) => result.map_err(HookFault::Handler),
        Err(panic) => Err(HookFault::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
