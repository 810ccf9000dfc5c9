use relaybot_core::BlockKind;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::PlainText { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// A single mrkdwn block carrying `text`, with the same text as the
/// notification/screen-reader fallback.
pub fn markup_message(text: &str, kind: BlockKind) -> MessageTemplate {
    let builder = MessageBuilder::new(text);
    match kind {
        BlockKind::Section => builder.section("relaybot.reply.section.v1", |section| {
            section.mrkdwn(text);
        }),
        BlockKind::Context => builder.context("relaybot.reply.context.v1", |context| {
            context.mrkdwn(text);
        }),
    }
    .build()
}

#[cfg(test)]
mod tests {
    use relaybot_core::BlockKind;
    use serde_json::json;

    use super::{markup_message, Block, MessageBuilder, TextObject};

    #[test]
    fn section_markup_serializes_to_block_kit_shape() {
        let message = markup_message("*hi*", BlockKind::Section);

        assert_eq!(message.fallback_text, "*hi*");
        let blocks = serde_json::to_value(&message.blocks).expect("serialize blocks");
        assert_eq!(
            blocks,
            json!([{
                "type": "section",
                "block_id": "relaybot.reply.section.v1",
                "text": { "type": "mrkdwn", "text": "*hi*" }
            }])
        );
    }

    #[test]
    fn context_markup_wraps_text_in_a_single_element() {
        let message = markup_message("note", BlockKind::Context);

        assert_eq!(message.blocks.len(), 1);
        match &message.blocks[0] {
            Block::Context { elements, .. } => {
                assert_eq!(elements, &vec![TextObject::mrkdwn("note")]);
            }
            other => panic!("expected context block, got {other:?}"),
        }
    }

    #[test]
    fn builder_defaults_empty_section_to_plain_text() {
        let message = MessageBuilder::new("fallback").section("empty.v1", |_| {}).build();

        let blocks = serde_json::to_value(&message.blocks).expect("serialize blocks");
        assert_eq!(blocks[0]["text"], json!({ "type": "plain_text", "text": "" }));
    }
}
