//! Reference resolution for authors and taxonomy terms.
//!
//! Authors, categories and tags are written to the store before any post,
//! so every reference a post carries points at a document that exists.
//! Posts name their terms by display name (`<category domain="...">Name`),
//! so the lookup maps built here are keyed by name.

use std::collections::{HashMap, HashSet};

use crate::documents::{
    author_document, category_document, tag_document, Reference, TaxonomyKind,
};
use crate::error::Result;
use crate::progress::{MigrationProgressEvent, MigrationProgressReporter, Stage};
use crate::store::{upsert, ContentStore};
use crate::wxr::{Channel, ItemRecord};

pub const DOMAIN_CATEGORY: &str = "category";
pub const DOMAIN_TAG: &str = "post_tag";

/// Term display name → document reference. A later term with the same
/// name replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    by_name: HashMap<String, Reference>,
}

impl ReferenceMap {
    pub fn insert(&mut self, name: impl Into<String>, reference: Reference) {
        self.by_name.insert(name.into(), reference);
    }

    pub fn resolve(&self, name: &str) -> Option<&Reference> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Everything a post needs to link to already-written documents.
#[derive(Debug, Clone, Default)]
pub struct ResolvedReferences {
    /// Author login → reference, in export order.
    pub authors: Vec<(String, Reference)>,
    pub categories: ReferenceMap,
    pub tags: ReferenceMap,
}

impl ResolvedReferences {
    /// The author for a post: the one whose login matches `dc:creator`,
    /// otherwise the first author in the export.
    pub fn author_for(&self, creator: Option<&str>) -> Option<&Reference> {
        creator
            .and_then(|login| {
                self.authors
                    .iter()
                    .find(|(l, _)| l == login)
                    .map(|(_, r)| r)
            })
            .or_else(|| self.authors.first().map(|(_, r)| r))
    }
}

/// Upsert every author, category and tag, in that order, and return the
/// lookup tables. A store failure here aborts: posts cannot reference
/// documents that were never written.
pub async fn resolve_references(
    store: &dyn ContentStore,
    channel: &Channel,
    language: &str,
    progress: &dyn MigrationProgressReporter,
) -> Result<ResolvedReferences> {
    let mut resolved = ResolvedReferences::default();

    progress.report(MigrationProgressEvent::StageStarted {
        stage: Stage::Authors,
        total: channel.authors.len() as u64,
    });
    for author in &channel.authors {
        let doc = author_document(author);
        upsert(store, &doc).await?;
        tracing::debug!(id = %doc.id, name = %doc.name, "author written");
        resolved
            .authors
            .push((author.login.clone(), Reference::to(doc.id)));
    }

    progress.report(MigrationProgressEvent::StageStarted {
        stage: Stage::Categories,
        total: channel.categories.len() as u64,
    });
    for category in &channel.categories {
        let doc = category_document(category, language);
        upsert(store, &doc).await?;
        tracing::debug!(id = %doc.id, slug = %doc.slug.current, "category written");
        resolved
            .categories
            .insert(category.name.clone(), Reference::to(doc.id));
    }

    progress.report(MigrationProgressEvent::StageStarted {
        stage: Stage::Tags,
        total: channel.tags.len() as u64,
    });
    for tag in &channel.tags {
        let doc = tag_document(tag, language);
        upsert(store, &doc).await?;
        tracing::debug!(id = %doc.id, slug = %doc.slug.current, "tag written");
        resolved.tags.insert(tag.name.clone(), Reference::to(doc.id));
    }

    tracing::info!(
        authors = resolved.authors.len(),
        categories = channel.categories.len(),
        tags = channel.tags.len(),
        "references resolved"
    );
    Ok(resolved)
}

/// A post's resolved term references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedTerms {
    pub categories: Vec<Reference>,
    pub tags: Vec<Reference>,
    /// `"<kind>:<name>"` for every term name with no matching document.
    pub unresolved: Vec<String>,
}

/// Resolve an item's category and tag names to keyed references.
///
/// Names that do not resolve are left out and a reference appears at most
/// once. With `first_category_only`, only the first resolved category is
/// kept.
pub fn link_terms(
    item: &ItemRecord,
    refs: &ResolvedReferences,
    first_category_only: bool,
) -> LinkedTerms {
    let mut linked = LinkedTerms::default();

    linked.categories = collect_refs(
        item.term_names(DOMAIN_CATEGORY),
        &refs.categories,
        TaxonomyKind::Category,
        &mut linked.unresolved,
    );
    if first_category_only {
        linked.categories.truncate(1);
    }
    linked.tags = collect_refs(
        item.term_names(DOMAIN_TAG),
        &refs.tags,
        TaxonomyKind::Tag,
        &mut linked.unresolved,
    );
    linked
}

fn collect_refs<'a>(
    names: impl Iterator<Item = &'a str>,
    map: &ReferenceMap,
    kind: TaxonomyKind,
    unresolved: &mut Vec<String>,
) -> Vec<Reference> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        match map.resolve(name) {
            Some(r) => {
                if seen.insert(r.id.clone()) {
                    out.push(r.keyed());
                }
            }
            None => {
                tracing::debug!(kind = kind.as_str(), name, "term does not resolve");
                unresolved.push(format!("{}:{}", kind.as_str(), name));
            }
        }
    }
    out
}
