//! Custom deserialization rules.
//!
//! A rule inspects one element and either claims it by returning a node or
//! declines with `None`, leaving the element to the default conversion.

use scraper::{ElementRef, Selector};

use crate::blocks::{BubblePosition, KeyGen, Node, SpeechBubble};
use crate::schema::BlockSchema;

use super::Transcoder;

/// What a rule may use while building its node.
pub struct RuleContext<'k> {
    keys: &'k mut KeyGen,
}

impl<'k> RuleContext<'k> {
    pub fn new(keys: &'k mut KeyGen) -> Self {
        Self { keys }
    }

    pub fn next_key(&mut self) -> String {
        self.keys.next_key()
    }

    /// Convert the children of `element` with the default rules of
    /// `schema` and no custom rules.
    pub fn convert_children(&mut self, element: ElementRef<'_>, schema: &BlockSchema) -> Vec<Node> {
        Transcoder::new(schema.clone()).convert_element(element, self.keys)
    }
}

pub trait DeserializeRule: Send + Sync {
    fn name(&self) -> &str;

    fn deserialize(&self, element: ElementRef<'_>, cx: &mut RuleContext<'_>) -> Option<Node>;
}

pub const ANONYMOUS_SPEAKER: &str = "Anonymous";

/// Converts chat-style "balloon" markup into a `speechBubble` node:
///
/// ```html
/// <div class="balloon_l">
///   <div class="faceicon"><img src="/me.png" alt="Me"><p>Gomix</p></div>
///   <div class="chatting"><div class="says"><p>Hello!</p></div></div>
/// </div>
/// ```
///
/// The element must be a `div` whose class contains `balloon` (any case)
/// and must contain both a `.faceicon` and a `.chatting .says` descendant.
pub struct SpeechBubbleRule {
    face_icon: Selector,
    says: Selector,
    paragraph: Selector,
    image: Selector,
    text_schema: BlockSchema,
}

impl SpeechBubbleRule {
    pub fn new() -> Self {
        Self {
            face_icon: parse_selector(".faceicon"),
            says: parse_selector(".chatting .says"),
            paragraph: parse_selector("p"),
            image: parse_selector("img"),
            text_schema: BlockSchema::speech_bubble_text(),
        }
    }
}

impl Default for SpeechBubbleRule {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// First descendant of `element` matching `selector`, excluding `element`
/// itself.
fn first_descendant<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    element.select(selector).find(|e| *e != element)
}

impl DeserializeRule for SpeechBubbleRule {
    fn name(&self) -> &str {
        "speech-bubble"
    }

    fn deserialize(&self, element: ElementRef<'_>, cx: &mut RuleContext<'_>) -> Option<Node> {
        if element.value().name() != "div" {
            return None;
        }
        let class = element.value().attr("class")?.to_lowercase();
        if !class.contains("balloon") {
            return None;
        }
        let face_icon = first_descendant(element, &self.face_icon)?;
        let says = first_descendant(element, &self.says)?;

        let avatar_el = first_descendant(face_icon, &self.image);
        let speaker = match first_descendant(face_icon, &self.paragraph) {
            Some(p) => p.text().collect::<String>().trim().to_string(),
            None => avatar_el
                .and_then(|img| img.value().attr("alt"))
                .unwrap_or(ANONYMOUS_SPEAKER)
                .to_string(),
        };
        let avatar = avatar_el
            .and_then(|img| img.value().attr("src"))
            .unwrap_or("")
            .to_string();
        let position = if class.contains("_l") {
            BubblePosition::Left
        } else {
            BubblePosition::Right
        };

        let key = cx.next_key();
        let text = cx.convert_children(says, &self.text_schema);
        Some(Node::SpeechBubble(SpeechBubble {
            key,
            speaker,
            avatar,
            position,
            text,
        }))
    }
}
