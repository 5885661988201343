use super::Id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single displayable chunk of a message. Drivers dispatch on the tag and
/// silently skip kinds they don't understand, which is what lets this enum
/// grow new variants without breaking existing drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { content: String },
    Embed(Embed),
}

impl ContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { content } => Some(content),
            Self::Embed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub color: Option<u32>,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub author: Option<EmbedAuthor>,
    pub footer: Option<EmbedFooter>,
    pub thumbnail: Option<String>,
    pub media: Option<String>,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    /// Note: the original implementation's footer-rendering path referenced
    /// `author.icon_url` here, which only ever resolved because author and
    /// footer icons were usually the same image in practice. The footer
    /// owns its own icon field; drivers must read it from here.
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// An attachment. Owned by the [`MessageContent`] that carries it; dropped
/// once fan-out has consumed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub data: Vec<u8>,
    pub filename: String,
    pub url: Option<String>,
    pub media: bool,
    pub spoiler: bool,
}

impl File {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// The origin message as seen by the bridge core, before fan-out. A content
/// value is consumed once per `send`/`edit` call; filters may rewrite its
/// `blocks` in place (e.g. substituting a `safe_content` Text block) but
/// nothing mutates it once fan-out has begun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    pub original_id: Id,
    pub original_channel_id: Id,
    pub blocks: Vec<ContentBlock>,
    pub files: Vec<File>,
    /// Group ids this message replies to.
    pub replies: Vec<Id>,
    /// A short preview of each reply target's text, keyed by group id.
    pub reply_content: HashMap<Id, String>,
    /// Attachment counts of each reply target, keyed by group id.
    pub reply_attachments: HashMap<Id, usize>,
}

impl MessageContent {
    pub fn new(original_id: Id, original_channel_id: Id) -> Self {
        Self {
            original_id,
            original_channel_id,
            blocks: Vec::new(),
            files: Vec::new(),
            replies: Vec::new(),
            reply_content: HashMap::new(),
            reply_attachments: HashMap::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(ContentBlock::text(text));
        self
    }

    /// The concatenation of every Text block, in order. Used by filters to
    /// check plaintext-only predicates without caring about embeds.
    pub fn to_plaintext(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            if let ContentBlock::Text { content } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(content);
            }
        }
        out
    }

    /// Replace every Text block with a single block carrying `safe_content`,
    /// leaving Embed blocks untouched. Used when a filter returns a
    /// `safe_content` substitute instead of an outright block.
    pub fn replace_text_blocks(&mut self, safe_content: impl Into<String>) {
        self.blocks.retain(|block| !matches!(block, ContentBlock::Text { .. }));
        self.blocks.insert(0, ContentBlock::text(safe_content));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Id {
        s.into()
    }

    #[test]
    fn to_plaintext_joins_text_blocks_and_skips_embeds() {
        let mut content = MessageContent::new(id("m1"), id("c1"));
        content.blocks.push(ContentBlock::text("hello"));
        content.blocks.push(ContentBlock::Embed(Embed::default()));
        content.blocks.push(ContentBlock::text("world"));

        assert_eq!(content.to_plaintext(), "hello\nworld");
    }

    #[test]
    fn replace_text_blocks_keeps_embeds_and_collapses_text() {
        let mut content = MessageContent::new(id("m1"), id("c1"));
        content.blocks.push(ContentBlock::text("@everyone hi"));
        content.blocks.push(ContentBlock::Embed(Embed::default()));

        content.replace_text_blocks("<pings removed>");

        assert_eq!(content.blocks.len(), 2);
        assert_eq!(content.blocks[0].as_text(), Some("<pings removed>"));
        assert!(matches!(content.blocks[1], ContentBlock::Embed(_)));
    }

    #[test]
    fn replace_text_blocks_is_idempotent() {
        let mut content = MessageContent::new(id("m1"), id("c1"));
        content.blocks.push(ContentBlock::text("abc"));

        content.replace_text_blocks("safe");
        let after_first = content.blocks.clone();
        content.replace_text_blocks("safe");

        assert_eq!(content.blocks, after_first);
    }
}
