//! HTML → block-tree conversion.
//!
//! The HTML fragment is parsed with `scraper` and walked depth-first.
//! Inline content accumulates into a pending text block; block-level
//! elements (`p`, `div`, headings, list items, ...) close the pending block
//! before and after their content. Marks are carried down the walk as a
//! stack of decorators and link annotations, and every emitted text run
//! records the marks active at that point.
//!
//! Before the default handling, each element is offered to the configured
//! [`DeserializeRule`]s in order. The first rule that returns a node wins,
//! as long as the schema allows that node type; otherwise the element falls
//! through to the default handling.
//!
//! WordPress stores post bodies with `wpautop` formatting, so bare text at
//! the top level is split into paragraphs on blank lines, and a single
//! newline inside such text is kept as a line break.

pub mod rules;

use scraper::{ElementRef, Html};

use crate::blocks::{ImageNode, KeyGen, ListKind, MarkDef, Node, Span, TextBlock};
use crate::schema::{BlockSchema, STYLE_NORMAL};

pub use rules::{DeserializeRule, RuleContext, SpeechBubbleRule};

/// Elements whose content never reaches the output.
const DROPPED: &[&str] = &[
    "script", "style", "iframe", "noscript", "template", "object", "embed", "video", "audio",
    "canvas", "svg", "head", "title", "meta", "link", "button", "input", "select", "textarea",
];

/// Elements that start and end a text block.
const BLOCK_CONTAINERS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "aside", "nav", "figure",
    "figcaption", "address", "center", "dl", "dt", "dd", "table", "thead", "tbody", "tfoot",
    "tr", "td", "th", "caption", "details", "summary", "form", "fieldset",
];

pub struct Transcoder {
    schema: BlockSchema,
    rules: Vec<Box<dyn DeserializeRule>>,
}

impl Transcoder {
    /// A transcoder with no custom rules.
    pub fn new(schema: BlockSchema) -> Self {
        Self {
            schema,
            rules: Vec::new(),
        }
    }

    /// The post-body transcoder: full body schema plus the speech-bubble
    /// rule.
    pub fn post_body() -> Self {
        Self::new(BlockSchema::post_body()).with_rule(SpeechBubbleRule::new())
    }

    pub fn with_rule(mut self, rule: impl DeserializeRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Convert an HTML fragment. Keys are drawn from `keys` in document
    /// order, so the same input and seed always give the same output.
    pub fn convert(&self, html: &str, keys: &mut KeyGen) -> Vec<Node> {
        if html.trim().is_empty() {
            return Vec::new();
        }
        let fragment = Html::parse_fragment(html);
        self.convert_element(fragment.root_element(), keys)
    }

    /// Convert the children of an already-parsed element.
    pub fn convert_element(&self, element: ElementRef<'_>, keys: &mut KeyGen) -> Vec<Node> {
        let mut walk = Walk {
            transcoder: self,
            keys,
            out: Vec::new(),
            pending: PendingBlock::default(),
            style: STYLE_NORMAL.to_string(),
            list: None,
            list_depth: 0,
            block_depth: 0,
            preformatted: false,
        };
        walk.children(element, &Marks::default());
        walk.finish()
    }
}

#[derive(Debug, Clone, Default)]
struct Marks {
    decorators: Vec<&'static str>,
    /// Active link annotations as `(key, href)`.
    links: Vec<(String, String)>,
}

impl Marks {
    fn with_decorator(&self, decorator: &'static str) -> Marks {
        let mut next = self.clone();
        if !next.decorators.contains(&decorator) {
            next.decorators.push(decorator);
        }
        next
    }

    fn with_link(&self, key: String, href: String) -> Marks {
        let mut next = self.clone();
        next.links.push((key, href));
        next
    }

    fn names(&self) -> Vec<String> {
        self.decorators
            .iter()
            .map(|d| d.to_string())
            .chain(self.links.iter().map(|(k, _)| k.clone()))
            .collect()
    }
}

#[derive(Debug, Default)]
struct PendingBlock {
    runs: Vec<(String, Vec<String>)>,
    mark_defs: Vec<MarkDef>,
}

impl PendingBlock {
    fn ends_with_whitespace(&self) -> bool {
        self.runs
            .last()
            .map(|(t, _)| t.ends_with(' ') || t.ends_with('\n'))
            .unwrap_or(true)
    }
}

struct Walk<'t, 'k> {
    transcoder: &'t Transcoder,
    keys: &'k mut KeyGen,
    out: Vec<Node>,
    pending: PendingBlock,
    style: String,
    list: Option<(ListKind, u32)>,
    list_depth: u32,
    /// Number of enclosing block containers; zero means loose top-level text.
    block_depth: usize,
    preformatted: bool,
}

impl Walk<'_, '_> {
    fn schema(&self) -> &BlockSchema {
        &self.transcoder.schema
    }

    fn children(&mut self, element: ElementRef<'_>, marks: &Marks) {
        for child in element.children() {
            match child.value() {
                scraper::Node::Text(text) => self.text(text, marks),
                scraper::Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el, marks);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>, marks: &Marks) {
        let transcoder = self.transcoder;
        for rule in &transcoder.rules {
            let mut cx = RuleContext::new(&mut *self.keys);
            if let Some(node) = rule.deserialize(el, &mut cx) {
                if transcoder.schema.allows_node(&node) {
                    self.flush();
                    self.out.push(node);
                    return;
                }
                tracing::debug!(
                    rule = rule.name(),
                    node = node.type_name(),
                    "rule output not allowed by schema"
                );
            }
        }

        let name = el.value().name();
        if DROPPED.contains(&name) {
            return;
        }
        match name {
            "br" => self.push_run("\n".to_string(), marks),
            "hr" => self.flush(),
            "img" => self.image(el),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<u8>().unwrap_or(1);
                let style = self.schema().heading_style(level);
                self.block(el, Some(style), marks);
            }
            "blockquote" => {
                let style = self.schema().quote_style().to_string();
                self.block(el, Some(style), marks);
            }
            "pre" => {
                self.flush();
                let was = std::mem::replace(&mut self.preformatted, true);
                let marks = self.decorate(marks, "code");
                self.block(el, None, &marks);
                self.preformatted = was;
            }
            "ul" => self.list(el, ListKind::Bullet, marks),
            "ol" => self.list(el, ListKind::Number, marks),
            "li" => {
                let kind = self.list.map(|(k, _)| k).unwrap_or(ListKind::Bullet);
                self.list_item(el, kind, self.list_depth.max(1), marks);
            }
            "strong" | "b" => {
                let marks = self.decorate(marks, "strong");
                self.children(el, &marks);
            }
            "em" | "i" => {
                let marks = self.decorate(marks, "em");
                self.children(el, &marks);
            }
            "code" | "kbd" | "samp" | "tt" => {
                let marks = self.decorate(marks, "code");
                self.children(el, &marks);
            }
            "u" | "ins" => {
                let marks = self.decorate(marks, "underline");
                self.children(el, &marks);
            }
            "s" | "strike" | "del" => {
                let marks = self.decorate(marks, "strike-through");
                self.children(el, &marks);
            }
            "a" => match el.value().attr("href").map(str::trim) {
                Some(href) if !href.is_empty() && self.schema().allows_links() => {
                    let key = self.keys.next_key();
                    let marks = marks.with_link(key, href.to_string());
                    self.children(el, &marks);
                }
                _ => self.children(el, marks),
            },
            _ if BLOCK_CONTAINERS.contains(&name) => self.block(el, None, marks),
            _ => self.children(el, marks),
        }
    }

    /// Add `decorator` if the schema allows it; otherwise keep marks as-is.
    fn decorate(&self, marks: &Marks, decorator: &'static str) -> Marks {
        if self.schema().allows_decorator(decorator) {
            marks.with_decorator(decorator)
        } else {
            marks.clone()
        }
    }

    fn block(&mut self, el: ElementRef<'_>, style: Option<String>, marks: &Marks) {
        self.flush();
        let saved = style.map(|s| std::mem::replace(&mut self.style, s));
        self.block_depth += 1;
        self.children(el, marks);
        self.flush();
        self.block_depth -= 1;
        if let Some(previous) = saved {
            self.style = previous;
        }
    }

    fn list(&mut self, el: ElementRef<'_>, kind: ListKind, marks: &Marks) {
        self.flush();
        if !self.schema().allows_list(kind) {
            self.block(el, None, marks);
            return;
        }
        self.list_depth += 1;
        let level = self.list_depth;
        self.block_depth += 1;
        for child in el.children() {
            match ElementRef::wrap(child) {
                Some(item) if item.value().name() == "li" => {
                    self.list_item(item, kind, level, marks);
                }
                Some(other) => self.element(other, marks),
                None => {
                    if let scraper::Node::Text(text) = child.value() {
                        self.text(text, marks);
                    }
                }
            }
        }
        self.flush();
        self.block_depth -= 1;
        self.list_depth -= 1;
    }

    fn list_item(&mut self, el: ElementRef<'_>, kind: ListKind, level: u32, marks: &Marks) {
        self.flush();
        let saved = if self.schema().allows_list(kind) {
            std::mem::replace(&mut self.list, Some((kind, level)))
        } else {
            self.list
        };
        self.block_depth += 1;
        self.children(el, marks);
        self.flush();
        self.block_depth -= 1;
        self.list = saved;
    }

    fn image(&mut self, el: ElementRef<'_>) {
        let src = el.value().attr("src").map(str::trim).unwrap_or("");
        if src.is_empty() || !self.schema().allows_images() {
            return;
        }
        self.flush();
        let alt = el
            .value()
            .attr("alt")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let key = self.keys.next_key();
        self.out.push(Node::Image(ImageNode {
            key,
            src: src.to_string(),
            alt,
        }));
    }

    fn text(&mut self, raw: &str, marks: &Marks) {
        if self.preformatted {
            self.push_run(raw.to_string(), marks);
            return;
        }
        if self.block_depth > 0 {
            self.push_collapsed(collapse_whitespace(raw, false), marks);
            return;
        }
        for (i, paragraph) in split_paragraphs(raw).into_iter().enumerate() {
            if i > 0 {
                self.flush();
            }
            self.push_collapsed(collapse_whitespace(&paragraph, true), marks);
        }
    }

    /// Push whitespace-collapsed text, dropping a leading space when the
    /// pending block already ends with whitespace.
    fn push_collapsed(&mut self, text: String, marks: &Marks) {
        let text = if self.pending.ends_with_whitespace() {
            text.trim_start_matches(|c| c == ' ' || c == '\n').to_string()
        } else {
            text
        };
        self.push_run(text, marks);
    }

    fn push_run(&mut self, text: String, marks: &Marks) {
        if text.is_empty() {
            return;
        }
        for (key, href) in &marks.links {
            if !self.pending.mark_defs.iter().any(|d| &d.key == key) {
                self.pending.mark_defs.push(MarkDef {
                    key: key.clone(),
                    href: href.clone(),
                });
            }
        }
        let names = marks.names();
        match self.pending.runs.last_mut() {
            Some((last, last_marks)) if *last_marks == names => last.push_str(&text),
            _ => self.pending.runs.push((text, names)),
        }
    }

    /// Close the pending block. Blocks with no visible text are dropped.
    fn flush(&mut self) {
        let mut runs = std::mem::take(&mut self.pending.runs);
        let mark_defs = std::mem::take(&mut self.pending.mark_defs);

        if !self.preformatted {
            trim_runs(&mut runs);
        }
        runs.retain(|(t, _)| !t.is_empty());
        if runs.iter().all(|(t, _)| t.trim().is_empty()) {
            return;
        }

        let used: Vec<MarkDef> = mark_defs
            .into_iter()
            .filter(|d| runs.iter().any(|(_, m)| m.contains(&d.key)))
            .collect();

        let key = self.keys.next_key();
        let children: Vec<Span> = runs
            .into_iter()
            .map(|(text, marks)| Span {
                key: self.keys.next_key(),
                text,
                marks,
            })
            .collect();
        let (list_item, level) = match self.list {
            Some((kind, level)) => (Some(kind), Some(level)),
            None => (None, None),
        };
        self.out.push(Node::Block(TextBlock {
            key,
            style: self.style.clone(),
            mark_defs: used,
            children,
            list_item,
            level,
        }));
    }

    fn finish(mut self) -> Vec<Node> {
        self.flush();
        self.out
    }
}

/// Trim whitespace at the outer edges of a block's runs, dropping runs that
/// become empty.
fn trim_runs(runs: &mut Vec<(String, Vec<String>)>) {
    while let Some((first, _)) = runs.first_mut() {
        let trimmed = first.trim_start().to_string();
        if trimmed.is_empty() {
            runs.remove(0);
        } else {
            *first = trimmed;
            break;
        }
    }
    while let Some((last, _)) = runs.last_mut() {
        let trimmed = last.trim_end().to_string();
        if trimmed.is_empty() {
            runs.pop();
        } else {
            *last = trimmed;
            break;
        }
    }
}

/// Collapse runs of HTML whitespace. With `keep_newlines`, a run that
/// contains a newline becomes `"\n"`; otherwise every run becomes one space.
/// Non-breaking spaces are content, not whitespace.
fn collapse_whitespace(text: &str, keep_newlines: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run: Option<bool> = None;
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            let newline = run.unwrap_or(false) || c == '\n';
            run = Some(newline);
            continue;
        }
        if let Some(newline) = run.take() {
            out.push(if keep_newlines && newline { '\n' } else { ' ' });
        }
        out.push(c);
    }
    if let Some(newline) = run {
        out.push(if keep_newlines && newline { '\n' } else { ' ' });
    }
    out
}

/// Split loose text on blank lines. Consecutive blank lines count as one
/// break. A break at either edge yields an empty segment there, so the
/// caller still closes the surrounding block.
fn split_paragraphs(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let last = lines.len() - 1;
    let mut parts = vec![String::new()];
    let mut pending_break = false;
    for (i, line) in lines.iter().enumerate() {
        let blank = i > 0 && i < last && line.trim().is_empty();
        if blank {
            pending_break = true;
            continue;
        }
        if pending_break {
            parts.push(String::new());
            pending_break = false;
        } else if i > 0 {
            if let Some(part) = parts.last_mut() {
                part.push('\n');
            }
        }
        if let Some(part) = parts.last_mut() {
            part.push_str(line);
        }
    }
    parts
}
