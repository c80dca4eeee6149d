//! Item classification.
//!
//! Splits export items into migratable posts and media attachments, and
//! builds the attachment-ID → URL lookup used later for thumbnails. Only
//! items with `post_type == "post"` and `status == "publish"` are migrated;
//! drafts, pages, private or trashed posts and every other post type are
//! dropped here and only counted.

use std::collections::{BTreeMap, HashMap};

use crate::wxr::ItemRecord;

pub const POST_TYPE_POST: &str = "post";
pub const POST_TYPE_ATTACHMENT: &str = "attachment";
pub const STATUS_PUBLISH: &str = "publish";

/// Attachment post ID → attachment URL (absolute or site-relative).
#[derive(Debug, Clone, Default)]
pub struct AttachmentMap {
    urls: HashMap<String, String>,
}

impl AttachmentMap {
    /// Build the map from attachment items. The URL is the GUID, or
    /// `wp:attachment_url` when the GUID is absent or blank. Attachments
    /// with no post ID or no URL are skipped.
    pub fn from_attachments<'a>(attachments: impl IntoIterator<Item = &'a ItemRecord>) -> (Self, usize) {
        let mut urls = HashMap::new();
        let mut skipped = 0usize;
        for item in attachments {
            match (item.post_id.as_deref(), attachment_source(item)) {
                (Some(id), Some(url)) => {
                    urls.insert(id.to_string(), url.to_string());
                }
                _ => {
                    tracing::debug!(
                        post_id = item.post_id.as_deref().unwrap_or("<none>"),
                        "skipping attachment without post id or url"
                    );
                    skipped += 1;
                }
            }
        }
        (Self { urls }, skipped)
    }

    pub fn get(&self, attachment_id: &str) -> Option<&str> {
        self.urls.get(attachment_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Result of partitioning the export's items.
#[derive(Debug)]
pub struct Classification<'a> {
    /// Published posts, in source order.
    pub posts: Vec<&'a ItemRecord>,
    pub attachments: AttachmentMap,
    /// Attachments dropped from the map for lack of an ID or URL.
    pub attachments_skipped: usize,
    /// Items that are neither migratable posts nor attachments, keyed by
    /// `"<post_type>/<status>"`.
    pub dropped: BTreeMap<String, usize>,
}

impl Classification<'_> {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

fn attachment_source(item: &ItemRecord) -> Option<&str> {
    fn non_blank(s: &Option<String>) -> Option<&str> {
        s.as_deref().filter(|s| !s.trim().is_empty())
    }
    non_blank(&item.guid).or_else(|| non_blank(&item.attachment_url))
}

pub fn is_attachment(item: &ItemRecord) -> bool {
    item.post_type() == POST_TYPE_ATTACHMENT
}

pub fn is_migratable_post(item: &ItemRecord) -> bool {
    item.post_type() == POST_TYPE_POST && item.status() == STATUS_PUBLISH
}

/// Partition `items` into posts and attachments.
pub fn classify(items: &[ItemRecord]) -> Classification<'_> {
    let mut posts = Vec::new();
    let mut attachments = Vec::new();
    let mut dropped: BTreeMap<String, usize> = BTreeMap::new();

    for item in items {
        if is_attachment(item) {
            attachments.push(item);
        } else if is_migratable_post(item) {
            posts.push(item);
        } else {
            let key = format!("{}/{}", or_dash(item.post_type()), or_dash(item.status()));
            *dropped.entry(key).or_default() += 1;
        }
    }

    let (attachments, attachments_skipped) = AttachmentMap::from_attachments(attachments);

    Classification {
        posts,
        attachments,
        attachments_skipped,
        dropped,
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}
