//! Sanity HTTP API client.
//!
//! Documents go through the mutations endpoint as a single
//! `createOrReplace` mutation each:
//!
//! ```text
//! POST {host}/v{version}/data/mutate/{dataset}
//! { "mutations": [ { "createOrReplace": { "_id": "post-12", ... } } ] }
//! ```
//!
//! Images go to the assets endpoint as a raw body, with the original
//! filename as a query parameter; the response carries the asset document
//! whose `_id` becomes the `mainImage` reference.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::SanityCredentials;
use crate::error::{MigrateError, Result};

use super::{ContentStore, ImageUpload};

const ERROR_BODY_LIMIT: usize = 500;

pub struct SanityClient {
    http: reqwest::Client,
    /// `https://<project>.api.sanity.io/v<version>`
    base: String,
    dataset: String,
    token: String,
}

#[derive(Deserialize)]
struct AssetResponse {
    document: AssetDocument,
}

#[derive(Deserialize)]
struct AssetDocument {
    #[serde(rename = "_id")]
    id: String,
}

impl SanityClient {
    pub fn new(credentials: SanityCredentials, http: reqwest::Client) -> Self {
        let host = credentials
            .api_host
            .clone()
            .unwrap_or_else(|| format!("https://{}.api.sanity.io", credentials.project_id));
        let version = credentials.api_version.trim_start_matches('v');
        Self {
            http,
            base: format!("{}/v{}", host.trim_end_matches('/'), version),
            dataset: credentials.dataset,
            token: credentials.token,
        }
    }

    pub fn mutate_url(&self) -> String {
        format!("{}/data/mutate/{}", self.base, self.dataset)
    }

    pub fn image_upload_url(&self, filename: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/assets/images/{}", self.base, self.dataset),
            &[("filename", filename)],
        )
        .map_err(|e| MigrateError::Config(format!("invalid Sanity API host: {}", e)))
    }
}

/// Turn a non-success response into [`MigrateError::Store`], keeping at most
/// the first 500 characters of the body.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(MigrateError::Store {
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    })
}

#[async_trait]
impl ContentStore for SanityClient {
    fn name(&self) -> String {
        format!("sanity:{}", self.dataset)
    }

    async fn create_or_replace(&self, document: &serde_json::Value) -> Result<()> {
        let body = serde_json::json!({
            "mutations": [ { "createOrReplace": document } ]
        });
        let resp = self
            .http
            .post(self.mutate_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn upload_image(&self, image: &ImageUpload) -> Result<String> {
        let url = self.image_upload_url(&image.filename)?;
        let content_type = image
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(image.bytes.clone())
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let asset: AssetResponse = resp.json().await?;
        Ok(asset.document.id)
    }
}
