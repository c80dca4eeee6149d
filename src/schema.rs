//! Block schemas: which styles, lists, marks and objects a rich-text field
//! accepts. The transcoder never emits anything its schema does not list;
//! unsupported headings are coerced, unsupported marks are dropped while
//! their text is kept.

use crate::blocks::{ListKind, Node};

pub const STYLE_NORMAL: &str = "normal";
pub const STYLE_BLOCKQUOTE: &str = "blockquote";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSchema {
    styles: Vec<String>,
    lists: Vec<ListKind>,
    decorators: Vec<String>,
    links: bool,
    images: bool,
    speech_bubbles: bool,
}

impl BlockSchema {
    /// Schema of a post body: normal, h1-h4 and blockquote styles, bullet and
    /// numbered lists, strong/em/code, links, inline images and speech
    /// bubbles.
    pub fn post_body() -> Self {
        Self {
            styles: ["normal", "h1", "h2", "h3", "h4", "blockquote"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            lists: vec![ListKind::Bullet, ListKind::Number],
            decorators: ["strong", "em", "code"].iter().map(|s| s.to_string()).collect(),
            links: true,
            images: true,
            speech_bubbles: true,
        }
    }

    /// Schema of the text inside a speech bubble: paragraphs only, with
    /// strong/em and links.
    pub fn speech_bubble_text() -> Self {
        Self {
            styles: vec![STYLE_NORMAL.to_string()],
            lists: Vec::new(),
            decorators: ["strong", "em"].iter().map(|s| s.to_string()).collect(),
            links: true,
            images: false,
            speech_bubbles: false,
        }
    }

    pub fn allows_style(&self, style: &str) -> bool {
        style == STYLE_NORMAL || self.styles.iter().any(|s| s == style)
    }

    /// Style for an `<hN>` heading. Picks the closest allowed heading level
    /// (the shallower one on a tie) or `normal` when no heading is allowed,
    /// so `h5` and `h6` land on `h4` in the post body.
    pub fn heading_style(&self, level: u8) -> String {
        let allowed: Vec<u8> = (1..=6u8)
            .filter(|n| self.allows_style(&format!("h{}", n)))
            .collect();
        allowed
            .iter()
            .min_by_key(|n| ((**n as i16 - level as i16).abs(), **n))
            .map(|n| format!("h{}", n))
            .unwrap_or_else(|| STYLE_NORMAL.to_string())
    }

    pub fn quote_style(&self) -> &str {
        if self.allows_style(STYLE_BLOCKQUOTE) {
            STYLE_BLOCKQUOTE
        } else {
            STYLE_NORMAL
        }
    }

    pub fn allows_list(&self, kind: ListKind) -> bool {
        self.lists.contains(&kind)
    }

    pub fn allows_decorator(&self, decorator: &str) -> bool {
        self.decorators.iter().any(|d| d == decorator)
    }

    pub fn allows_links(&self) -> bool {
        self.links
    }

    pub fn allows_images(&self) -> bool {
        self.images
    }

    /// Whether a node of this type may appear at the top level of a field
    /// with this schema.
    pub fn allows_node(&self, node: &Node) -> bool {
        match node {
            Node::Block(_) => true,
            Node::Image(_) => self.images,
            Node::SpeechBubble(_) => self.speech_bubbles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_body_coerces_deep_headings() {
        let schema = BlockSchema::post_body();
        assert_eq!(schema.heading_style(2), "h2");
        assert_eq!(schema.heading_style(4), "h4");
        assert_eq!(schema.heading_style(5), "h4");
        assert_eq!(schema.heading_style(6), "h4");
        assert_eq!(schema.heading_style(1), "h1");
    }

    #[test]
    fn nearest_heading_prefers_shallower_on_tie() {
        let mut schema = BlockSchema::speech_bubble_text();
        schema.styles = vec!["h2".to_string(), "h4".to_string()];
        assert_eq!(schema.heading_style(3), "h2");
        assert_eq!(schema.heading_style(1), "h2");
        assert_eq!(schema.heading_style(6), "h4");
    }

    #[test]
    fn bubble_text_has_no_headings_or_lists() {
        let schema = BlockSchema::speech_bubble_text();
        assert_eq!(schema.heading_style(2), "normal");
        assert_eq!(schema.quote_style(), "normal");
        assert!(!schema.allows_list(ListKind::Bullet));
        assert!(!schema.allows_decorator("code"));
        assert!(schema.allows_decorator("em"));
        assert!(schema.allows_links());
        assert!(!schema.allows_images());
    }
}
