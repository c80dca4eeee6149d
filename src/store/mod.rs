//! Content store abstraction.
//!
//! The [`ContentStore`] trait is the only seam through which the migration
//! writes. [`SanityClient`](sanity::SanityClient) talks to the Sanity HTTP
//! API; [`InMemoryStore`](memory::InMemoryStore) backs dry runs and tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sanity;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use memory::InMemoryStore;
pub use sanity::SanityClient;

/// Image bytes ready for upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    /// Basename sent as the asset's original filename.
    pub filename: String,
    /// Content type reported by the origin, if any.
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short name for logs (`sanity:production`, `memory`).
    fn name(&self) -> String;

    /// Write `document` keyed by its `_id`, replacing any existing document
    /// with that ID.
    async fn create_or_replace(&self, document: &serde_json::Value) -> Result<()>;

    /// Upload an image asset and return the asset document ID.
    async fn upload_image(&self, image: &ImageUpload) -> Result<String>;
}

/// Serialize a typed document and write it with create-or-replace.
pub async fn upsert<T: Serialize + Sync>(store: &dyn ContentStore, document: &T) -> Result<()> {
    let value = serde_json::to_value(document)?;
    store.create_or_replace(&value).await
}
