//! Error taxonomy for the migration.
//!
//! Configuration and input errors abort the run before any document is
//! written. Everything else surfaces from inside the post loop, where the
//! pipeline decides whether to record-and-skip or abort (see
//! [`MigrationOptions::continue_on_error`](crate::pipeline::MigrationOptions)).

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the migration library.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Missing or invalid configuration (credentials, dataset, options).
    #[error("configuration error: {0}")]
    Config(String),

    /// The export file could not be read.
    #[error("failed to read export file {}: {source}", .path.display())]
    ReadExport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The export is not well-formed XML or lacks the RSS channel.
    #[error("failed to parse export: {0}")]
    ParseExport(String),

    /// An item lacks a field required to build its document.
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// A post carries no usable publication date.
    #[error("invalid publication date for post {post_id}: {value:?}")]
    Timestamp { post_id: String, value: String },

    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The content store answered with a non-success status.
    #[error("content store rejected request (HTTP {status}): {body}")]
    Store { status: u16, body: String },

    /// Thumbnail download or URL resolution failure.
    #[error("asset error: {0}")]
    Asset(String),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MigrateError>;
