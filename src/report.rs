//! Migration run report.
//!
//! Collected while the pipeline runs, printed as a plain-text summary at the
//! end, and optionally written as JSON (`run --report`). The summary goes to
//! stdout unless the JSON report does.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ThumbnailStats {
    pub uploaded: usize,
    pub failed: usize,
    /// `_thumbnail_id` pointed at an attachment missing from the export.
    pub missing_attachment: usize,
    /// Downloads skipped because images were disabled for the run.
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigratedPost {
    pub post_id: String,
    pub document_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostFailure {
    pub post_id: String,
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub site: String,
    pub store: String,
    pub started_at: String,
    pub duration_ms: u64,
    pub authors: usize,
    pub categories: usize,
    pub tags: usize,
    pub attachments_mapped: usize,
    pub attachments_skipped: usize,
    pub items_total: usize,
    /// Non-migrated items by `"<post_type>/<status>"`.
    pub items_dropped: BTreeMap<String, usize>,
    /// Published posts selected for this run (after `--limit`).
    pub posts_selected: usize,
    pub posts_migrated: usize,
    pub thumbnails: ThumbnailStats,
    pub migrated: Vec<MigratedPost>,
    pub failed_posts: Vec<PostFailure>,
}

impl MigrationReport {
    pub fn has_failures(&self) -> bool {
        !self.failed_posts.is_empty()
    }

    pub fn record_migrated(&mut self, post: MigratedPost) {
        self.posts_migrated += 1;
        self.migrated.push(post);
    }

    pub fn record_failure(&mut self, post_id: &str, title: &str, error: &MigrateError) {
        self.failed_posts.push(PostFailure {
            post_id: post_id.to_string(),
            title: title.to_string(),
            error: error.to_string(),
        });
    }

    /// Plain-text summary, one field per line, ending in `ok`.
    pub fn write_summary(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "migrate {}  ->  {}", display_or_dash(&self.site), self.store)?;
        writeln!(out, "  authors:      {}", self.authors)?;
        writeln!(out, "  categories:   {}", self.categories)?;
        writeln!(out, "  tags:         {}", self.tags)?;
        writeln!(
            out,
            "  attachments:  {} mapped, {} skipped",
            self.attachments_mapped, self.attachments_skipped
        )?;
        writeln!(
            out,
            "  items:        {} total, {} not migrated",
            self.items_total,
            self.items_dropped.values().sum::<usize>()
        )?;
        writeln!(
            out,
            "  posts:        {} / {} migrated",
            self.posts_migrated, self.posts_selected
        )?;
        writeln!(
            out,
            "  thumbnails:   {} uploaded, {} failed, {} missing, {} skipped",
            self.thumbnails.uploaded,
            self.thumbnails.failed,
            self.thumbnails.missing_attachment,
            self.thumbnails.skipped
        )?;
        if self.has_failures() {
            writeln!(out, "  failed posts: {}", self.failed_posts.len())?;
            for f in &self.failed_posts {
                writeln!(out, "    post {} \"{}\": {}", f.post_id, f.title, f.error)?;
            }
        }
        writeln!(out, "  duration:     {:.2}s", self.duration_ms as f64 / 1000.0)?;
        writeln!(out, "ok")
    }

    /// Write the report as pretty JSON to `path`, or to stdout for `-`.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if is_stdout(path) {
            println!("{}", json);
        } else {
            std::fs::write(path, json)?;
        }
        Ok(())
    }
}

/// `-` names stdout wherever a report path is accepted.
pub fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn display_or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}
