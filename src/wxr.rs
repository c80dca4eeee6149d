//! WordPress eXtended RSS (WXR) export parsing.
//!
//! Parsing happens in two passes. The first drives a `quick-xml` event reader
//! and builds a small generic element tree, keeping qualified names
//! (`wp:post_id`, `content:encoded`) as element names, attributes separate
//! from children, and CDATA sections merged into element text. The second pass
//! normalizes that tree into the typed [`ExportDocument`], so every
//! multi-valued field (items, authors, categories, tags, item terms, postmeta)
//! is a `Vec` regardless of how many occurrences the export contains.
//!
//! Any XML error aborts the parse: there is no partial export.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{MigrateError, Result};

/// Root of a parsed export.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub channel: Channel,
}

/// The `<channel>` element: site metadata plus every exported entity.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub title: Option<String>,
    pub link: Option<String>,
    pub base_site_url: Option<String>,
    pub authors: Vec<AuthorRecord>,
    pub categories: Vec<CategoryRecord>,
    pub tags: Vec<TagRecord>,
    pub items: Vec<ItemRecord>,
}

impl Channel {
    /// Base URL used to absolutize relative attachment URLs.
    pub fn site_url(&self) -> &str {
        self.link
            .as_deref()
            .or(self.base_site_url.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRecord {
    pub id: String,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub term_id: String,
    pub name: String,
    /// Raw `wp:category_nicename`, still percent-encoded.
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub term_id: String,
    pub name: String,
    /// Raw `wp:tag_slug`, still percent-encoded.
    pub slug: String,
}

/// A `<category>` element inside an item. WordPress links posts to both
/// categories and tags through this one element, discriminated by `domain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTerm {
    pub domain: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMeta {
    pub key: String,
    pub value: String,
}

/// One `<item>`: a post, page, attachment, nav menu entry, ...
#[derive(Debug, Clone, Default)]
pub struct ItemRecord {
    pub title: Option<String>,
    pub guid: Option<String>,
    pub creator: Option<String>,
    pub content: String,
    pub excerpt: String,
    pub post_id: Option<String>,
    pub post_date: Option<String>,
    pub post_date_gmt: Option<String>,
    pub post_name: Option<String>,
    pub status: Option<String>,
    pub post_type: Option<String>,
    pub attachment_url: Option<String>,
    pub terms: Vec<ItemTerm>,
    pub postmeta: Vec<PostMeta>,
}

impl ItemRecord {
    pub fn post_type(&self) -> &str {
        self.post_type.as_deref().unwrap_or("")
    }

    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    /// First postmeta value stored under `key`.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.postmeta
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.value.as_str())
    }

    /// Names of the item terms in `domain`, in source order.
    pub fn term_names<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.terms
            .iter()
            .filter(move |t| t.domain.as_deref() == Some(domain))
            .map(|t| t.name.as_str())
    }
}

/// Read and parse an export file.
pub fn read_export(path: &Path) -> Result<ExportDocument> {
    let xml = std::fs::read_to_string(path).map_err(|source| MigrateError::ReadExport {
        path: path.to_path_buf(),
        source,
    })?;
    parse_export(&xml)
}

/// Parse WXR text into an [`ExportDocument`].
pub fn parse_export(xml: &str) -> Result<ExportDocument> {
    let root = parse_tree(xml)?;
    let rss = root
        .child("rss")
        .ok_or_else(|| MigrateError::ParseExport("missing <rss> root element".to_string()))?;
    let channel = rss
        .child("channel")
        .ok_or_else(|| MigrateError::ParseExport("missing <channel> element".to_string()))?;

    Ok(ExportDocument {
        channel: normalize_channel(channel),
    })
}

// ============ Generic element tree ============

#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child called `name`; empty text counts as absent.
    fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_tree(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    // Start with the synthetic document node.
    let mut stack: Vec<XmlElement> = vec![XmlElement::default()];

    loop {
        let event = reader.read_event().map_err(|e| {
            MigrateError::ParseExport(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;
        match event {
            Event::Start(e) => stack.push(element_from_start(&e)?),
            Event::Empty(e) => {
                let element = element_from_start(&e)?;
                append_child(&mut stack, element);
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(MigrateError::ParseExport(
                        "closing tag without matching opening tag".to_string(),
                    ));
                }
                if let Some(element) = stack.pop() {
                    append_child(&mut stack, element);
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| MigrateError::ParseExport(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if stack.len() != 1 {
        let open = stack.last().map(|e| e.name.clone()).unwrap_or_default();
        return Err(MigrateError::ParseExport(format!(
            "unexpected end of document inside <{}>",
            open
        )));
    }
    stack
        .pop()
        .ok_or_else(|| MigrateError::ParseExport("empty document".to_string()))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| MigrateError::ParseExport(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| MigrateError::ParseExport(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        ..XmlElement::default()
    })
}

fn append_child(stack: &mut [XmlElement], element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
}

// ============ Normalization ============

fn normalize_channel(channel: &XmlElement) -> Channel {
    let authors = channel
        .children_named("wp:author")
        .filter_map(|a| {
            let id = a.child_text("wp:author_id");
            let login = a.child_text("wp:author_login");
            match (id, login) {
                (Some(id), Some(login)) => Some(AuthorRecord { id, login }),
                _ => {
                    tracing::debug!("skipping wp:author without id or login");
                    None
                }
            }
        })
        .collect();

    let categories = channel
        .children_named("wp:category")
        .filter_map(|c| {
            let Some(term_id) = c.child_text("wp:term_id") else {
                tracing::debug!("skipping wp:category without term id");
                return None;
            };
            Some(CategoryRecord {
                term_id,
                name: c.child_text("wp:cat_name").unwrap_or_default(),
                slug: c.child_text("wp:category_nicename").unwrap_or_default(),
            })
        })
        .collect();

    let tags = channel
        .children_named("wp:tag")
        .filter_map(|t| {
            let Some(term_id) = t.child_text("wp:term_id") else {
                tracing::debug!("skipping wp:tag without term id");
                return None;
            };
            Some(TagRecord {
                term_id,
                name: t.child_text("wp:tag_name").unwrap_or_default(),
                slug: t.child_text("wp:tag_slug").unwrap_or_default(),
            })
        })
        .collect();

    let items = channel.children_named("item").map(normalize_item).collect();

    Channel {
        title: channel.child_text("title"),
        link: channel.child_text("link"),
        base_site_url: channel.child_text("wp:base_site_url"),
        authors,
        categories,
        tags,
        items,
    }
}

fn normalize_item(item: &XmlElement) -> ItemRecord {
    let terms = item
        .children_named("category")
        .map(|c| ItemTerm {
            domain: c.attr("domain").map(str::to_string),
            name: c.text.trim().to_string(),
        })
        .collect();

    let postmeta = item
        .children_named("wp:postmeta")
        .filter_map(|m| {
            let key = m.child_text("wp:meta_key")?;
            let value = m
                .child("wp:meta_value")
                .map(|v| v.text.trim().to_string())
                .unwrap_or_default();
            Some(PostMeta { key, value })
        })
        .collect();

    ItemRecord {
        title: item.child_text("title"),
        guid: item.child_text("guid"),
        creator: item.child_text("dc:creator"),
        content: item
            .child("content:encoded")
            .map(|c| c.text.clone())
            .unwrap_or_default(),
        excerpt: item
            .child("excerpt:encoded")
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default(),
        post_id: item.child_text("wp:post_id"),
        post_date: item.child_text("wp:post_date"),
        post_date_gmt: item.child_text("wp:post_date_gmt"),
        post_name: item.child_text("wp:post_name"),
        status: item.child_text("wp:status"),
        post_type: item.child_text("wp:post_type"),
        attachment_url: item.child_text("wp:attachment_url"),
        terms,
        postmeta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_ITEM: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<rss version="2.0"
    xmlns:excerpt="http://wordpress.org/export/1.2/excerpt/"
    xmlns:content="http://purl.org/rss/1.0/modules/content/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
    <title>Gomix Blog</title>
    <link>https://example.com</link>
    <wp:base_site_url>https://example.com</wp:base_site_url>
    <wp:author>
        <wp:author_id>1</wp:author_id>
        <wp:author_login><![CDATA[gomix]]></wp:author_login>
        <wp:author_display_name><![CDATA[Gomix]]></wp:author_display_name>
    </wp:author>
    <wp:category>
        <wp:term_id>5</wp:term_id>
        <wp:category_nicename><![CDATA[%e6%97%a5%e8%a8%98]]></wp:category_nicename>
        <wp:category_parent><![CDATA[]]></wp:category_parent>
        <wp:cat_name><![CDATA[Diary]]></wp:cat_name>
    </wp:category>
    <wp:tag>
        <wp:term_id>9</wp:term_id>
        <wp:tag_slug><![CDATA[rust]]></wp:tag_slug>
        <wp:tag_name><![CDATA[Rust]]></wp:tag_name>
    </wp:tag>
    <item>
        <title><![CDATA[Hello & welcome]]></title>
        <guid isPermaLink="false">https://example.com/?p=12</guid>
        <dc:creator><![CDATA[gomix]]></dc:creator>
        <content:encoded><![CDATA[<p>Body <strong>text</strong></p>]]></content:encoded>
        <excerpt:encoded><![CDATA[]]></excerpt:encoded>
        <wp:post_id>12</wp:post_id>
        <wp:post_date_gmt><![CDATA[2023-04-01 09:30:00]]></wp:post_date_gmt>
        <wp:post_name><![CDATA[hello]]></wp:post_name>
        <wp:status><![CDATA[publish]]></wp:status>
        <wp:post_type><![CDATA[post]]></wp:post_type>
        <category domain="category" nicename="diary"><![CDATA[Diary]]></category>
        <category domain="post_tag" nicename="rust"><![CDATA[Rust]]></category>
        <wp:postmeta>
            <wp:meta_key><![CDATA[_thumbnail_id]]></wp:meta_key>
            <wp:meta_value><![CDATA[40]]></wp:meta_value>
        </wp:postmeta>
    </item>
</channel>
</rss>"#;

    #[test]
    fn single_item_is_normalized_to_a_vec() {
        let doc = parse_export(SINGLE_ITEM).unwrap();
        assert_eq!(doc.channel.items.len(), 1);
        assert_eq!(doc.channel.categories.len(), 1);
        assert_eq!(doc.channel.tags.len(), 1);
        assert_eq!(doc.channel.authors.len(), 1);
    }

    #[test]
    fn cdata_and_attributes_are_preserved() {
        let doc = parse_export(SINGLE_ITEM).unwrap();
        let item = &doc.channel.items[0];
        assert_eq!(item.title.as_deref(), Some("Hello & welcome"));
        assert_eq!(item.content, "<p>Body <strong>text</strong></p>");
        assert_eq!(item.guid.as_deref(), Some("https://example.com/?p=12"));
        assert_eq!(item.post_type(), "post");
        assert_eq!(item.status(), "publish");
        assert_eq!(item.meta("_thumbnail_id"), Some("40"));

        let domains: Vec<_> = item.terms.iter().map(|t| t.domain.as_deref()).collect();
        assert_eq!(domains, vec![Some("category"), Some("post_tag")]);
        assert_eq!(item.term_names("category").collect::<Vec<_>>(), vec!["Diary"]);
        assert_eq!(item.term_names("post_tag").collect::<Vec<_>>(), vec!["Rust"]);
    }

    #[test]
    fn channel_records_are_typed() {
        let doc = parse_export(SINGLE_ITEM).unwrap();
        let channel = &doc.channel;
        assert_eq!(channel.site_url(), "https://example.com");
        assert_eq!(channel.authors[0].login, "gomix");
        assert_eq!(channel.authors[0].id, "1");
        assert_eq!(channel.categories[0].term_id, "5");
        assert_eq!(channel.categories[0].slug, "%e6%97%a5%e8%a8%98");
        assert_eq!(channel.tags[0].name, "Rust");
    }

    #[test]
    fn empty_channel_has_no_items() {
        let xml = r#"<rss><channel><title>x</title></channel></rss>"#;
        let doc = parse_export(xml).unwrap();
        assert!(doc.channel.items.is_empty());
        assert_eq!(doc.channel.site_url(), "");
    }

    #[test]
    fn mismatched_tags_fail() {
        let xml = r#"<rss><channel><item></channel></item></rss>"#;
        let err = parse_export(xml).unwrap_err();
        assert!(matches!(err, MigrateError::ParseExport(_)));
    }

    #[test]
    fn truncated_document_fails() {
        let xml = r#"<rss><channel><item><title>cut"#;
        let err = parse_export(xml).unwrap_err();
        assert!(matches!(err, MigrateError::ParseExport(_)));
    }

    #[test]
    fn missing_channel_fails() {
        let err = parse_export("<rss></rss>").unwrap_err();
        assert!(err.to_string().contains("channel"));
    }

    #[test]
    fn entities_in_attributes_are_unescaped() {
        let xml = r#"<rss><channel><item>
            <category domain="post&amp;tag" nicename="a-b"><![CDATA[A&B]]></category>
        </item></channel></rss>"#;
        let doc = parse_export(xml).unwrap();
        let term = &doc.channel.items[0].terms[0];
        assert_eq!(term.domain.as_deref(), Some("post&tag"));
        assert_eq!(term.name, "A&B");
    }

    #[test]
    fn unreadable_file_is_an_input_error() {
        let err = read_export(Path::new("/nonexistent/export.xml")).unwrap_err();
        assert!(matches!(err, MigrateError::ReadExport { .. }));
    }
}
