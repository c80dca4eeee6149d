//! The migration pipeline.
//!
//! ```text
//! export ──► authors ──► categories ──► tags ──► attachment map ──► posts
//!            (upsert)    (upsert)       (upsert)  (in memory)       (convert body,
//!                                                                    thumbnail,
//!                                                                    upsert)
//! ```
//!
//! Stages run strictly in this order, so a post never references a
//! document that has not been written. Each write is a create-or-replace
//! on a deterministic ID, which makes the whole run idempotent.
//!
//! Reference-stage failures abort the run. Inside the post stage a failure
//! is isolated to that post and recorded in the report, unless
//! `continue_on_error` is off. Thumbnail failures never fail a post: the
//! post is written without `mainImage`.

use std::time::Instant;

use chrono::{NaiveDateTime, Utc};

use crate::assets::{lookup_thumbnail, resolve_thumbnail_url, ImageFetcher, ThumbnailLookup};
use crate::blocks::KeyGen;
use crate::classify::{classify, AttachmentMap};
use crate::config::MigrationConfig;
use crate::documents::{
    decode_slug, post_document_id, ImageField, Localized, PostDocument, Reference, Slug,
    LOCALE_BLOCK, LOCALE_STRING, LOCALE_TEXT,
};
use crate::error::{MigrateError, Result};
use crate::progress::{MigrationProgressEvent, MigrationProgressReporter, Stage};
use crate::references::{link_terms, resolve_references, ResolvedReferences};
use crate::report::{MigratedPost, MigrationReport};
use crate::store::{upsert, ContentStore};
use crate::transcode::Transcoder;
use crate::wxr::{ExportDocument, ItemRecord};

const WP_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Language key for localized fields.
    pub language: String,
    pub first_category_only: bool,
    /// Record a failing post and keep going instead of aborting.
    pub continue_on_error: bool,
    /// Migrate at most this many published posts.
    pub limit: Option<usize>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

impl MigrationOptions {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            language: config.default_language.clone(),
            first_category_only: config.first_category_only,
            continue_on_error: config.continue_on_error,
            limit: None,
        }
    }
}

/// What happened to one post's featured image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    None,
    MissingAttachment,
    Skipped,
    Uploaded { asset_id: String },
    Failed { reason: String },
}

/// Publication time as ISO-8601 UTC with milliseconds.
///
/// `post_date_gmt` is used when present and valid; otherwise `post_date`,
/// also read as UTC. Drafts carry the zero date `0000-00-00 00:00:00`,
/// which does not parse and so counts as missing.
pub fn publish_timestamp(item: &ItemRecord) -> Result<String> {
    let candidates = [item.post_date_gmt.as_deref(), item.post_date.as_deref()];
    for value in candidates.into_iter().flatten() {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value.trim(), WP_DATE_FORMAT) {
            return Ok(naive
                .and_utc()
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string());
        }
    }
    Err(MigrateError::Timestamp {
        post_id: item.post_id.clone().unwrap_or_default(),
        value: item
            .post_date_gmt
            .clone()
            .or_else(|| item.post_date.clone())
            .unwrap_or_default(),
    })
}

/// Title used for logs and the document; untitled posts get a placeholder
/// naming their ID.
pub fn post_title(item: &ItemRecord) -> String {
    match item.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => format!(
            "(No Title - ID: {})",
            item.post_id.as_deref().unwrap_or("?")
        ),
    }
}

/// Build a post document without its `mainImage`. Also returns the term
/// names that did not resolve.
pub fn build_post_document(
    item: &ItemRecord,
    refs: &ResolvedReferences,
    transcoder: &Transcoder,
    options: &MigrationOptions,
) -> Result<(PostDocument, Vec<String>)> {
    let post_id = item
        .post_id
        .as_deref()
        .ok_or_else(|| MigrateError::InvalidItem("published post without wp:post_id".to_string()))?;
    let id = post_document_id(post_id);
    let published_at = publish_timestamp(item)?;

    let slug = match item.post_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => decode_slug(name),
        _ => post_id.to_string(),
    };

    let terms = link_terms(item, refs, options.first_category_only);
    let mut keys = KeyGen::new(id.clone());
    let body = transcoder.convert(&item.content, &mut keys);
    let language = options.language.as_str();

    let doc = PostDocument {
        id,
        title: Localized::new(LOCALE_STRING, language, post_title(item)),
        slug: Slug::new(slug),
        excerpt: Localized::new(LOCALE_TEXT, language, item.excerpt.clone()),
        published_at,
        author: refs.author_for(item.creator.as_deref()).cloned(),
        categories: terms.categories,
        tags: terms.tags,
        body: Localized::new(LOCALE_BLOCK, language, body),
        main_image: None,
    };
    Ok((doc, terms.unresolved))
}

/// Resolve, download and upload a post's featured image. Never fails:
/// every problem is logged and reported as an outcome.
pub async fn attach_thumbnail(
    item: &ItemRecord,
    attachments: &AttachmentMap,
    site_url: &str,
    fetcher: Option<&ImageFetcher>,
    store: &dyn ContentStore,
) -> ThumbnailOutcome {
    let (attachment_id, raw_url) = match lookup_thumbnail(item, attachments) {
        ThumbnailLookup::None => return ThumbnailOutcome::None,
        ThumbnailLookup::MissingAttachment { attachment_id } => {
            tracing::debug!(attachment_id = %attachment_id, "thumbnail attachment not in export");
            return ThumbnailOutcome::MissingAttachment;
        }
        ThumbnailLookup::Found { attachment_id, url } => (attachment_id, url),
    };

    let Some(fetcher) = fetcher else {
        return ThumbnailOutcome::Skipped;
    };

    match upload_thumbnail(&raw_url, site_url, fetcher, store).await {
        Ok(asset_id) => ThumbnailOutcome::Uploaded { asset_id },
        Err(e) => {
            tracing::warn!(
                attachment_id = %attachment_id,
                url = %raw_url,
                error = %e,
                "thumbnail upload failed; post will have no main image"
            );
            ThumbnailOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

async fn upload_thumbnail(
    raw_url: &str,
    site_url: &str,
    fetcher: &ImageFetcher,
    store: &dyn ContentStore,
) -> Result<String> {
    let url = resolve_thumbnail_url(raw_url, site_url)?;
    tracing::info!(url = %url, "fetching thumbnail");
    let image = fetcher.fetch(&url).await?;
    store.upload_image(&image).await
}

struct PostContext<'a> {
    refs: &'a ResolvedReferences,
    attachments: &'a AttachmentMap,
    site_url: &'a str,
    transcoder: &'a Transcoder,
    fetcher: Option<&'a ImageFetcher>,
    store: &'a dyn ContentStore,
    options: &'a MigrationOptions,
}

async fn migrate_post(
    item: &ItemRecord,
    cx: &PostContext<'_>,
) -> Result<(MigratedPost, ThumbnailOutcome)> {
    let (mut doc, unresolved_terms) =
        build_post_document(item, cx.refs, cx.transcoder, cx.options)?;

    let thumbnail =
        attach_thumbnail(item, cx.attachments, cx.site_url, cx.fetcher, cx.store).await;
    if let ThumbnailOutcome::Uploaded { asset_id } = &thumbnail {
        doc.main_image = Some(ImageField {
            asset: Reference::to(asset_id.clone()),
        });
    }

    upsert(cx.store, &doc).await?;

    Ok((
        MigratedPost {
            post_id: item.post_id.clone().unwrap_or_default(),
            document_id: doc.id,
            title: doc.title.value,
            main_image: doc.main_image.map(|img| img.asset.id),
            unresolved_terms,
        },
        thumbnail,
    ))
}

/// Run the whole migration of `export` into `store`.
///
/// Pass `fetcher = None` to skip featured images entirely.
pub async fn run_migration(
    export: &ExportDocument,
    store: &dyn ContentStore,
    fetcher: Option<&ImageFetcher>,
    options: &MigrationOptions,
    progress: &dyn MigrationProgressReporter,
) -> Result<MigrationReport> {
    let started = Instant::now();
    let channel = &export.channel;
    let mut report = MigrationReport {
        site: channel.site_url().to_string(),
        store: store.name(),
        started_at: Utc::now().to_rfc3339(),
        items_total: channel.items.len(),
        ..MigrationReport::default()
    };

    tracing::info!(store = %report.store, site = %report.site, "starting migration");

    let refs = resolve_references(store, channel, &options.language, progress).await?;
    report.authors = channel.authors.len();
    report.categories = channel.categories.len();
    report.tags = channel.tags.len();

    let classification = classify(&channel.items);
    progress.report(MigrationProgressEvent::StageStarted {
        stage: Stage::Attachments,
        total: classification.attachments.len() as u64,
    });
    report.attachments_mapped = classification.attachments.len();
    report.attachments_skipped = classification.attachments_skipped;
    report.items_dropped = classification.dropped.clone();
    tracing::info!(
        attachments = classification.attachments.len(),
        posts = classification.posts.len(),
        dropped = classification.dropped_total(),
        "export classified"
    );

    let posts: Vec<&ItemRecord> = match options.limit {
        Some(limit) => classification.posts.iter().copied().take(limit).collect(),
        None => classification.posts.clone(),
    };
    report.posts_selected = posts.len();
    let total = posts.len() as u64;
    progress.report(MigrationProgressEvent::StageStarted {
        stage: Stage::Posts,
        total,
    });

    let transcoder = Transcoder::post_body();
    let cx = PostContext {
        refs: &refs,
        attachments: &classification.attachments,
        site_url: channel.site_url(),
        transcoder: &transcoder,
        fetcher,
        store,
        options,
    };

    for (i, item) in posts.iter().enumerate() {
        let title = post_title(item);
        progress.report(MigrationProgressEvent::Post {
            n: i as u64 + 1,
            total,
            title: title.clone(),
        });

        match migrate_post(item, &cx).await {
            Ok((post, thumbnail)) => {
                tracing::info!(id = %post.document_id, title = %post.title, "post written");
                match thumbnail {
                    ThumbnailOutcome::Uploaded { .. } => report.thumbnails.uploaded += 1,
                    ThumbnailOutcome::Failed { .. } => report.thumbnails.failed += 1,
                    ThumbnailOutcome::MissingAttachment => {
                        report.thumbnails.missing_attachment += 1
                    }
                    ThumbnailOutcome::Skipped => report.thumbnails.skipped += 1,
                    ThumbnailOutcome::None => {}
                }
                report.record_migrated(post);
            }
            Err(e) if options.continue_on_error => {
                let post_id = item.post_id.as_deref().unwrap_or("?");
                tracing::error!(post_id, title = %title, error = %e, "post failed");
                report.record_failure(post_id, &title, &e);
            }
            Err(e) => return Err(e),
        }
    }

    report.duration_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        migrated = report.posts_migrated,
        failed = report.failed_posts.len(),
        "migration finished"
    );
    Ok(report)
}
