use std::sync::Arc;

use relaybot_core::{to_mrkdwn, BlockKind, DataType, MessageData, OutgoingMessage};
use tracing::debug;

use crate::blocks::markup_message;
use crate::client::{SendMessageRequest, SlackApi, SlackApiError, UploadFileRequest};

pub const IMAGE_FILENAME: &str = "data.png";
pub const FILE_FILENAME: &str = "data.txt";

/// Turns an [`OutgoingMessage`] into the matching Slack API call.
#[derive(Clone)]
pub struct OutboundDispatcher {
    api: Arc<dyn SlackApi>,
}

impl OutboundDispatcher {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api }
    }

    /// Sends `message` according to its data type.
    ///
    /// A data type paired with the wrong payload kind is dropped without a
    /// platform call and without an error.
    pub async fn post_message(&self, message: OutgoingMessage) -> Result<(), SlackApiError> {
        let OutgoingMessage { channel_id, thread_id, data, data_type, block } = message;

        match (data_type, data) {
            (DataType::Text, MessageData::Text(text)) => {
                self.api
                    .send_message(SendMessageRequest {
                        channel: channel_id,
                        thread: thread_id,
                        text: Some(text),
                        blocks: None,
                    })
                    .await?;
            }
            (DataType::Mrkdwn, MessageData::Text(text)) => {
                self.send_markup(channel_id, thread_id, &text, block).await?;
            }
            (DataType::Markdown, MessageData::Text(text)) => {
                self.send_markup(channel_id, thread_id, &to_mrkdwn(&text), block).await?;
            }
            (DataType::Image, MessageData::Binary(file)) => {
                self.upload(channel_id, thread_id, file, IMAGE_FILENAME).await?;
            }
            (DataType::File, MessageData::Binary(file)) => {
                self.upload(channel_id, thread_id, file, FILE_FILENAME).await?;
            }
            (data_type, _) => {
                debug!(
                    event_name = "egress.slack.payload_mismatch",
                    channel_id = %channel_id,
                    data_type = %data_type,
                    "payload does not match data type; nothing sent"
                );
            }
        }

        Ok(())
    }

    async fn send_markup(
        &self,
        channel: String,
        thread: Option<String>,
        text: &str,
        block: Option<BlockKind>,
    ) -> Result<(), SlackApiError> {
        let template = markup_message(text, block.unwrap_or_default());
        self.api
            .send_message(SendMessageRequest {
                channel,
                thread,
                text: Some(template.fallback_text),
                blocks: Some(template.blocks),
            })
            .await?;
        Ok(())
    }

    async fn upload(
        &self,
        channel: String,
        thread: Option<String>,
        file: Vec<u8>,
        filename: &str,
    ) -> Result<(), SlackApiError> {
        self.api
            .upload_file(UploadFileRequest { channel, thread, file, filename: filename.to_owned() })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relaybot_core::{BlockKind, DataType, MessageData, OutgoingMessage};

    use super::OutboundDispatcher;
    use crate::blocks::{Block, TextObject};
    use crate::testing::{ApiCall, RecordingSlackApi};

    fn outgoing(data_type: DataType, data: MessageData, block: Option<BlockKind>) -> OutgoingMessage {
        OutgoingMessage {
            channel_id: "C1".to_owned(),
            thread_id: Some("T1".to_owned()),
            data,
            data_type,
            block,
        }
    }

    #[tokio::test]
    async fn text_sends_plain_message_without_blocks() {
        let api = Arc::new(RecordingSlackApi::default());
        let dispatcher = OutboundDispatcher::new(api.clone());

        dispatcher
            .post_message(outgoing(DataType::Text, "hi".into(), None))
            .await
            .expect("post should succeed");

        let calls = api.calls().await;
        assert_eq!(calls.len(), 1);
        let ApiCall::Send(request) = &calls[0] else {
            panic!("expected a send call, got {:?}", calls[0]);
        };
        assert_eq!(request.channel, "C1");
        assert_eq!(request.thread.as_deref(), Some("T1"));
        assert_eq!(request.text.as_deref(), Some("hi"));
        assert!(request.blocks.is_none());
    }

    #[tokio::test]
    async fn mrkdwn_section_sends_one_section_block() {
        let api = Arc::new(RecordingSlackApi::default());
        let dispatcher = OutboundDispatcher::new(api.clone());

        dispatcher
            .post_message(outgoing(DataType::Mrkdwn, "hi".into(), Some(BlockKind::Section)))
            .await
            .expect("post should succeed");

        let calls = api.calls().await;
        assert_eq!(calls.len(), 1);
        let ApiCall::Send(request) = &calls[0] else {
            panic!("expected a send call, got {:?}", calls[0]);
        };
        let blocks = request.blocks.as_ref().expect("blocks should be present");
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Block::Section { text, .. } => assert_eq!(text, &TextObject::mrkdwn("hi")),
            other => panic!("expected section block, got {other:?}"),
        }
        assert_eq!(request.text.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn mrkdwn_defaults_to_context_block() {
        let api = Arc::new(RecordingSlackApi::default());
        let dispatcher = OutboundDispatcher::new(api.clone());

        dispatcher
            .post_message(outgoing(DataType::Mrkdwn, "hi".into(), None))
            .await
            .expect("post should succeed");

        let calls = api.calls().await;
        let ApiCall::Send(request) = &calls[0] else {
            panic!("expected a send call, got {:?}", calls[0]);
        };
        let blocks = request.blocks.as_ref().expect("blocks should be present");
        assert!(matches!(&blocks[0], Block::Context { elements, .. } if elements[0].text() == "hi"));
    }

    #[tokio::test]
    async fn markdown_is_converted_before_sending() {
        let api = Arc::new(RecordingSlackApi::default());
        let dispatcher = OutboundDispatcher::new(api.clone());

        dispatcher
            .post_message(outgoing(
                DataType::Markdown,
                "# Done\n**ok** [log](http://x)".into(),
                Some(BlockKind::Section),
            ))
            .await
            .expect("post should succeed");

        let calls = api.calls().await;
        let ApiCall::Send(request) = &calls[0] else {
            panic!("expected a send call, got {:?}", calls[0]);
        };
        assert_eq!(request.text.as_deref(), Some("*Done*\n*ok* <http://x|log>"));
        let blocks = request.blocks.as_ref().expect("blocks should be present");
        assert!(
            matches!(&blocks[0], Block::Section { text, .. } if text.text() == "*Done*\n*ok* <http://x|log>")
        );
    }

    #[tokio::test]
    async fn binary_payloads_upload_with_fixed_filenames() {
        let api = Arc::new(RecordingSlackApi::default());
        let dispatcher = OutboundDispatcher::new(api.clone());

        dispatcher
            .post_message(outgoing(DataType::Image, vec![0x89_u8, 0x50].into(), None))
            .await
            .expect("image post should succeed");
        dispatcher
            .post_message(outgoing(DataType::File, b"log".to_vec().into(), None))
            .await
            .expect("file post should succeed");

        let calls = api.calls().await;
        assert_eq!(calls.len(), 2);
        match (&calls[0], &calls[1]) {
            (ApiCall::Upload(image), ApiCall::Upload(file)) => {
                assert_eq!(image.filename, "data.png");
                assert_eq!(image.thread.as_deref(), Some("T1"));
                assert_eq!(image.file, vec![0x89_u8, 0x50]);
                assert_eq!(file.filename, "data.txt");
                assert_eq!(file.file, b"log".to_vec());
            }
            other => panic!("expected two uploads, got {other:?}"),
        }
    }

    // Mismatched payloads are silently dropped rather than reported; callers get
    // no signal that nothing was sent.
    #[tokio::test]
    async fn mismatched_payload_makes_no_platform_call() {
        let api = Arc::new(RecordingSlackApi::default());
        let dispatcher = OutboundDispatcher::new(api.clone());

        dispatcher
            .post_message(outgoing(DataType::Image, "not bytes".into(), None))
            .await
            .expect("mismatch is not an error");
        dispatcher
            .post_message(outgoing(DataType::Text, vec![1_u8, 2, 3].into(), None))
            .await
            .expect("mismatch is not an error");

        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn platform_failures_propagate() {
        let api = Arc::new(RecordingSlackApi::failing_sends("channel_not_found"));
        let dispatcher = OutboundDispatcher::new(api.clone());

        let error = dispatcher
            .post_message(outgoing(DataType::Text, "hi".into(), None))
            .await
            .expect_err("send failure should propagate");

        assert!(error.to_string().contains("channel_not_found"));
    }
}
