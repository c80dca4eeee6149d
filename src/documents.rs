//! Sanity documents written by the migration.
//!
//! Every document ID is a pure function of its WordPress source ID
//! (`author-<id>`, `category-<term_id>`, `tag-<term_id>`, `post-<post_id>`),
//! so writing with create-or-replace converges on re-runs instead of
//! duplicating.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::blocks::Node;
use crate::wxr::{AuthorRecord, CategoryRecord, TagRecord};

/// A strong reference to another document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "_type", rename = "reference")]
pub struct Reference {
    #[serde(rename = "_ref")]
    pub id: String,
    /// Array member key; only set when the reference lives in an array.
    #[serde(rename = "_key", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Reference {
    pub fn to(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: None,
        }
    }

    /// The same reference, keyed by the target ID for use inside an array.
    pub fn keyed(&self) -> Self {
        Self {
            id: self.id.clone(),
            key: Some(self.id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "_type", rename = "slug")]
pub struct Slug {
    pub current: String,
}

impl Slug {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
        }
    }
}

/// A value stored under one language key of a localized object type,
/// e.g. `{ "_type": "localeString", "ja": "..." }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Localized<T> {
    pub type_name: &'static str,
    pub language: String,
    pub value: T,
}

impl<T> Localized<T> {
    pub fn new(type_name: &'static str, language: &str, value: T) -> Self {
        Self {
            type_name,
            language: language.to_string(),
            value,
        }
    }
}

impl<T: Serialize> Serialize for Localized<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("_type", self.type_name)?;
        map.serialize_entry(&self.language, &self.value)?;
        map.end()
    }
}

pub const LOCALE_STRING: &str = "localeString";
pub const LOCALE_TEXT: &str = "localeText";
pub const LOCALE_BLOCK: &str = "localeBlock";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "author")]
pub struct AuthorDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// Which taxonomy a [`TaxonomyDocument`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    Category,
    Tag,
}

impl TaxonomyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category",
            TaxonomyKind::Tag => "tag",
        }
    }

    /// Deterministic document ID for a WordPress term.
    pub fn document_id(&self, term_id: &str) -> String {
        format!("{}-{}", self.as_str(), term_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomyDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub kind: TaxonomyKind,
    pub title: Localized<String>,
    pub slug: Slug,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "image")]
pub struct ImageField {
    pub asset: Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "post", rename_all = "camelCase")]
pub struct PostDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Localized<String>,
    pub slug: Slug,
    pub excerpt: Localized<String>,
    /// ISO-8601 UTC with millisecond precision.
    pub published_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Reference>,
    pub categories: Vec<Reference>,
    pub tags: Vec<Reference>,
    pub body: Localized<Vec<Node>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image: Option<ImageField>,
}

pub fn author_document_id(author_id: &str) -> String {
    format!("author-{}", author_id)
}

pub fn post_document_id(post_id: &str) -> String {
    format!("post-{}", post_id)
}

pub fn author_document(author: &AuthorRecord) -> AuthorDocument {
    AuthorDocument {
        id: author_document_id(&author.id),
        name: author.login.clone(),
    }
}

pub fn category_document(category: &CategoryRecord, language: &str) -> TaxonomyDocument {
    TaxonomyDocument {
        id: TaxonomyKind::Category.document_id(&category.term_id),
        kind: TaxonomyKind::Category,
        title: Localized::new(LOCALE_STRING, language, category.name.clone()),
        slug: Slug::new(decode_slug(&category.slug)),
    }
}

pub fn tag_document(tag: &TagRecord, language: &str) -> TaxonomyDocument {
    TaxonomyDocument {
        id: TaxonomyKind::Tag.document_id(&tag.term_id),
        kind: TaxonomyKind::Tag,
        title: Localized::new(LOCALE_STRING, language, tag.name.clone()),
        slug: Slug::new(decode_slug(&tag.slug)),
    }
}

/// Percent-decode a WordPress slug. Slugs that do not decode to UTF-8 are
/// kept as stored.
pub fn decode_slug(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
