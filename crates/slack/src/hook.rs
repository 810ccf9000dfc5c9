use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use relaybot_core::{BlockKind, DataType, IncomingMessage, MessageData};

/// Application callback invoked once per normalized message.
///
/// Returning `Ok(None)` (or empty content) means "nothing to post". Errors are
/// reported back to the originating thread by the lifecycle.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: IncomingMessage) -> anyhow::Result<Option<MessageData>>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(IncomingMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<MessageData>>> + Send,
{
    async fn handle(&self, message: IncomingMessage) -> anyhow::Result<Option<MessageData>> {
        (self)(message).await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookMode {
    /// The handler's return value is posted back and the message gets a
    /// success reaction.
    Reply,
    /// The handler is awaited but its return value is discarded and no
    /// success reaction is added.
    FireAndForget,
}

#[derive(Clone)]
pub struct CommandHook {
    pub mode: HookMode,
    pub data_type: DataType,
    pub block: Option<BlockKind>,
    pub handler: Arc<dyn MessageHandler>,
}

impl CommandHook {
    pub fn reply<H>(data_type: DataType, handler: H) -> Self
    where
        H: MessageHandler + 'static,
    {
        Self { mode: HookMode::Reply, data_type, block: None, handler: Arc::new(handler) }
    }

    pub fn fire_and_forget<H>(handler: H) -> Self
    where
        H: MessageHandler + 'static,
    {
        Self {
            mode: HookMode::FireAndForget,
            data_type: DataType::Text,
            block: None,
            handler: Arc::new(handler),
        }
    }

    pub fn with_block(mut self, block: BlockKind) -> Self {
        self.block = Some(block);
        self
    }

    pub fn is_sync(&self) -> bool {
        self.mode == HookMode::Reply
    }
}

impl std::fmt::Debug for CommandHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHook")
            .field("mode", &self.mode)
            .field("data_type", &self.data_type)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use relaybot_core::{BlockKind, DataType, IncomingMessage, MessageData};

    use super::{CommandHook, HookMode};

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            message_id: "1.0".to_owned(),
            channel_id: "C1".to_owned(),
            thread_id: None,
            raw: text.to_owned(),
            message: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn closures_act_as_handlers() {
        let hook = CommandHook::reply(DataType::Markdown, |message: IncomingMessage| async move {
            anyhow::Ok(Some(MessageData::Text(message.message.to_uppercase())))
        })
        .with_block(BlockKind::Section);

        assert!(hook.is_sync());
        assert_eq!(hook.block, Some(BlockKind::Section));
        let reply = hook.handler.handle(message("ping")).await.expect("handler should succeed");
        assert_eq!(reply, Some(MessageData::Text("PING".to_owned())));
    }

    #[test]
    fn fire_and_forget_hooks_are_not_sync() {
        let hook = CommandHook::fire_and_forget(|_message: IncomingMessage| async {
            anyhow::Ok(None::<MessageData>)
        });

        assert_eq!(hook.mode, HookMode::FireAndForget);
        assert!(!hook.is_sync());
        assert!(format!("{hook:?}").contains("FireAndForget"));
    }
}
