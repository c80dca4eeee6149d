//! In-memory [`ContentStore`] for dry runs and tests.
//!
//! Documents live in a `BTreeMap` keyed by `_id` behind `std::sync::RwLock`.
//! Asset IDs are derived from a SHA-256 of the uploaded bytes, so uploading
//! the same image twice yields the same asset.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{MigrateError, Result};

use super::{ContentStore, ImageUpload};

#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: usize,
}

pub struct InMemoryStore {
    documents: RwLock<BTreeMap<String, serde_json::Value>>,
    assets: RwLock<BTreeMap<String, StoredAsset>>,
    writes: AtomicUsize,
    uploads: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            assets: RwLock::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
        }
    }

    pub fn document(&self, id: &str) -> Option<serde_json::Value> {
        let docs = self.documents.read().unwrap_or_else(|e| e.into_inner());
        docs.get(id).cloned()
    }

    /// All document IDs, sorted.
    pub fn document_ids(&self) -> Vec<String> {
        let docs = self.documents.read().unwrap_or_else(|e| e.into_inner());
        docs.keys().cloned().collect()
    }

    /// Documents whose `_type` equals `doc_type`, sorted by ID.
    pub fn documents_of_type(&self, doc_type: &str) -> Vec<serde_json::Value> {
        let docs = self.documents.read().unwrap_or_else(|e| e.into_inner());
        docs.values()
            .filter(|d| d.get("_type").and_then(|t| t.as_str()) == Some(doc_type))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn assets(&self) -> Vec<StoredAsset> {
        let assets = self.assets.read().unwrap_or_else(|e| e.into_inner());
        assets.values().cloned().collect()
    }

    /// Total create-or-replace calls, including replacements.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    fn name(&self) -> String {
        "memory".to_string()
    }

    async fn create_or_replace(&self, document: &serde_json::Value) -> Result<()> {
        let id = document
            .get("_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| MigrateError::InvalidItem("document has no _id".to_string()))?
            .to_string();
        let mut docs = self.documents.write().unwrap_or_else(|e| e.into_inner());
        docs.insert(id, document.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn upload_image(&self, image: &ImageUpload) -> Result<String> {
        let digest = hex::encode(Sha256::digest(&image.bytes));
        let ext = image
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        let id = format!("image-{}-{}", &digest[..40], ext);

        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        assets.insert(
            id.clone(),
            StoredAsset {
                id: id.clone(),
                filename: image.filename.clone(),
                content_type: image.content_type.clone(),
                size: image.bytes.len(),
            },
        );
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }
}
