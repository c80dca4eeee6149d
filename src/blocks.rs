//! Block-tree (Portable Text) model for rich-text bodies.
//!
//! A body is an ordered list of [`Node`]s, each tagged with `_type` so the
//! renderer can dispatch on it: text blocks, images, and speech bubbles whose
//! text is itself a nested block list.

use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type")]
pub enum Node {
    #[serde(rename = "block")]
    Block(TextBlock),
    #[serde(rename = "image")]
    Image(ImageNode),
    #[serde(rename = "speechBubble")]
    SpeechBubble(SpeechBubble),
}

impl Node {
    pub fn as_block(&self) -> Option<&TextBlock> {
        match self {
            Node::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_speech_bubble(&self) -> Option<&SpeechBubble> {
        match self {
            Node::SpeechBubble(b) => Some(b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Block(_) => "block",
            Node::Image(_) => "image",
            Node::SpeechBubble(_) => "speechBubble",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Bullet,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    #[serde(rename = "_key")]
    pub key: String,
    pub style: String,
    pub mark_defs: Vec<MarkDef>,
    pub children: Vec<Span>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_item: Option<ListKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

impl TextBlock {
    /// Concatenated span text.
    pub fn plain_text(&self) -> String {
        self.children.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "span")]
pub struct Span {
    #[serde(rename = "_key")]
    pub key: String,
    pub text: String,
    /// Decorator names and mark-definition keys.
    pub marks: Vec<String>,
}

/// Annotation referenced from span marks. Links are the only annotation
/// the body schemas allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "_type", rename = "link")]
pub struct MarkDef {
    #[serde(rename = "_key")]
    pub key: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageNode {
    #[serde(rename = "_key")]
    pub key: String,
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BubblePosition {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechBubble {
    #[serde(rename = "_key")]
    pub key: String,
    pub speaker: String,
    pub avatar: String,
    pub position: BubblePosition,
    pub text: Vec<Node>,
}

/// Deterministic `_key` source.
///
/// Keys are the first 12 hex digits of `SHA-256(seed ":" counter)`, so the
/// same body converted for the same document always gets the same keys.
#[derive(Debug, Clone)]
pub struct KeyGen {
    seed: String,
    counter: u64,
}

impl KeyGen {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            counter: 0,
        }
    }

    pub fn next_key(&mut self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.as_bytes());
        hasher.update(b":");
        hasher.update(self.counter.to_le_bytes());
        self.counter += 1;
        let digest = hex::encode(hasher.finalize());
        digest[..12].to_string()
    }
}
