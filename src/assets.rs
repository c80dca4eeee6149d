//! Featured-image (thumbnail) lookup and download.
//!
//! A post names its featured image indirectly: the `_thumbnail_id` postmeta
//! holds an attachment post ID, and the attachment's GUID holds the image
//! URL, which may be relative to the site root.

use url::Url;

use crate::classify::AttachmentMap;
use crate::error::{MigrateError, Result};
use crate::store::ImageUpload;
use crate::wxr::ItemRecord;

pub const THUMBNAIL_META_KEY: &str = "_thumbnail_id";

const FALLBACK_FILENAME: &str = "image";

/// Attachment ID stored in the item's `_thumbnail_id` postmeta, if any.
pub fn thumbnail_id(item: &ItemRecord) -> Option<&str> {
    item.meta(THUMBNAIL_META_KEY)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailLookup {
    /// The post has no `_thumbnail_id`.
    None,
    /// The post names an attachment that is not in the export.
    MissingAttachment { attachment_id: String },
    /// The attachment's raw URL, as stored in the export.
    Found { attachment_id: String, url: String },
}

pub fn lookup_thumbnail(item: &ItemRecord, attachments: &AttachmentMap) -> ThumbnailLookup {
    let Some(id) = thumbnail_id(item) else {
        return ThumbnailLookup::None;
    };
    match attachments.get(id) {
        Some(url) => ThumbnailLookup::Found {
            attachment_id: id.to_string(),
            url: url.to_string(),
        },
        None => ThumbnailLookup::MissingAttachment {
            attachment_id: id.to_string(),
        },
    }
}

/// Resolve an attachment URL against the site URL. Absolute URLs are used
/// as they are; relative ones are joined onto `site_url`.
pub fn resolve_thumbnail_url(raw: &str, site_url: &str) -> Result<Url> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(site_url).map_err(|e| {
                MigrateError::Asset(format!(
                    "cannot resolve relative URL {:?} against site URL {:?}: {}",
                    raw, site_url, e
                ))
            })?;
            base.join(raw)
                .map_err(|e| MigrateError::Asset(format!("invalid image URL {:?}: {}", raw, e)))
        }
        Err(e) => Err(MigrateError::Asset(format!(
            "invalid image URL {:?}: {}",
            raw, e
        ))),
    }
}

/// Last path segment of `url`, percent-decoded; `"image"` when the path
/// has no usable segment.
pub fn filename_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Downloads images over HTTP.
#[derive(Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` into memory. Non-success statuses are errors.
    pub async fn fetch(&self, url: &Url) -> Result<ImageUpload> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MigrateError::Asset(format!(
                "failed to fetch {} (HTTP {})",
                url, status
            )));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?.to_vec();
        Ok(ImageUpload {
            bytes,
            filename: filename_for(url),
            content_type,
        })
    }
}
