use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use relaybot_core::{BlockKind, DataType, IncomingMessage, MessageData, Reactions};
use relaybot_slack::client::{
    MessageHandle, ReactionRequest, SendMessageRequest, SlackApi, SlackApiError, UploadFileRequest,
    UploadHandle,
};
use relaybot_slack::socket::{EnvelopeKind, SlackEnvelope, SocketTransport, TransportError};
use relaybot_slack::{CommandHook, ListenOptions, SlackBot};
use serde_json::json;
use tokio::sync::Mutex;

#[derive(Default)]
struct FakeSlack {
    log: Mutex<Vec<String>>,
    sends: Mutex<Vec<SendMessageRequest>>,
}

impl FakeSlack {
    async fn log(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageHandle, SlackApiError> {
        self.log.lock().await.push(format!("send {}", request.channel));
        self.sends.lock().await.push(request);
        Ok(MessageHandle { ts: "1700000001.000000".to_owned() })
    }

    async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadHandle, SlackApiError> {
        self.log.lock().await.push(format!("upload {}", request.filename));
        Ok(UploadHandle { file_id: "F1".to_owned() })
    }

    async fn add_reaction(&self, request: ReactionRequest) -> Result<(), SlackApiError> {
        self.log.lock().await.push(format!("+{} {}", request.emoji, request.message_id));
        Ok(())
    }

    async fn remove_reaction(&self, request: ReactionRequest) -> Result<(), SlackApiError> {
        self.log.lock().await.push(format!("-{} {}", request.emoji, request.message_id));
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedSocket {
    frames: Mutex<VecDeque<SlackEnvelope>>,
    acks: Mutex<Vec<String>>,
}

impl ScriptedSocket {
    fn new(frames: Vec<SlackEnvelope>) -> Self {
        Self { frames: Mutex::new(frames.into()), acks: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl SocketTransport for ScriptedSocket {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(self.frames.lock().await.pop_front())
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        self.acks.lock().await.push(envelope_id.to_owned());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn events_api(envelope_id: &str, event: serde_json::Value) -> SlackEnvelope {
    SlackEnvelope {
        envelope_id: envelope_id.to_owned(),
        kind: EnvelopeKind::EventsApi,
        payload: json!({ "type": "event_callback", "event": event }),
    }
}

#[tokio::test]
async fn mention_flows_from_socket_to_markdown_reply() {
    let slack = Arc::new(FakeSlack::default());
    let socket = Arc::new(ScriptedSocket::new(vec![events_api(
        "env-1",
        json!({
            "type": "app_mention",
            "user": "U1",
            "channel": "C1",
            "ts": "1700000000.000100",
            "thread_ts": "1700000000.000001",
            "text": "<@UBOT> build status"
        }),
    )]));
    let bot = SlackBot::with_parts(slack.clone(), socket.clone(), "UBOT", Reactions::default());
    bot.register_handler(
        CommandHook::reply(DataType::Markdown, |message: IncomingMessage| async move {
            anyhow::Ok(Some(MessageData::Text(format!("## Result\n**{}** is green", message.message))))
        })
        .with_block(BlockKind::Section),
    );

    bot.listen(ListenOptions::default()).await.expect("listen should finish when the stream ends");

    assert_eq!(*socket.acks.lock().await, vec!["env-1"]);
    assert_eq!(
        slack.log().await,
        vec![
            "+thinking_face 1700000000.000100",
            "send C1",
            "+white_check_mark 1700000000.000100",
            "-thinking_face 1700000000.000100",
        ]
    );
    let sends = slack.sends.lock().await;
    assert_eq!(sends[0].thread.as_deref(), Some("1700000000.000001"));
    assert_eq!(sends[0].text.as_deref(), Some("*Result*\n*build status* is green"));
    assert!(sends[0].blocks.is_some());
}

#[tokio::test]
async fn handler_errors_become_apologies_in_the_thread() {
    let slack = Arc::new(FakeSlack::default());
    let socket = Arc::new(ScriptedSocket::new(vec![events_api(
        "env-1",
        json!({
            "type": "message",
            "channel_type": "im",
            "user": "U1",
            "channel": "D1",
            "ts": "1700000000.000200",
            "text": "do the thing"
        }),
    )]));
    let bot = SlackBot::with_parts(slack.clone(), socket, "UBOT", Reactions::default());
    bot.register_handler(CommandHook::reply(DataType::Text, |_message: IncomingMessage| async {
        Err::<Option<MessageData>, _>(anyhow::anyhow!("boom"))
    }));

    bot.listen(ListenOptions::default()).await.expect("listen should finish");

    assert_eq!(
        slack.log().await,
        vec![
            "+thinking_face 1700000000.000200",
            "+x 1700000000.000200",
            "send D1",
            "-thinking_face 1700000000.000200",
        ]
    );
    let sends = slack.sends.lock().await;
    assert_eq!(sends[0].text.as_deref(), Some("Sorry, something went wrong. (boom)"));
    assert_eq!(sends[0].thread, None);
}

#[tokio::test]
async fn disabled_kinds_and_own_messages_never_reach_the_handler() {
    let slack = Arc::new(FakeSlack::default());
    let socket = Arc::new(ScriptedSocket::new(vec![
        events_api(
            "env-dm",
            json!({
                "type": "message",
                "channel_type": "im",
                "user": "U1",
                "channel": "D1",
                "ts": "1.1",
                "text": "hello"
            }),
        ),
        events_api(
            "env-self",
            json!({
                "type": "app_mention",
                "user": "UBOT",
                "channel": "C1",
                "ts": "1.2",
                "text": "<@UBOT> talking to myself"
            }),
        ),
    ]));
    let bot = SlackBot::with_parts(slack.clone(), socket.clone(), "UBOT", Reactions::default());
    bot.register_handler(CommandHook::reply(DataType::Text, |_message: IncomingMessage| async {
        anyhow::Ok(Some(MessageData::from("unexpected")))
    }));

    bot.listen(ListenOptions { command: false, mention: true, direct_message: false })
        .await
        .expect("listen should finish");

    assert_eq!(*socket.acks.lock().await, vec!["env-dm", "env-self"]);
    assert!(slack.log().await.is_empty());
}
