//! Cloudinary blob store using signed uploads.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{BlobError, BlobMeta, BlobStore, StoredBlob};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Request timeout for calls to the image host.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudinary credentials and folder root.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Prefix for every upload folder, e.g. `shop` → `shop/products`.
    pub base_folder: Option<String>,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("base_folder", &self.base_folder)
            .finish_non_exhaustive()
    }
}

impl CloudinaryConfig {
    /// `Some` only when cloud name, key and secret are all non-empty.
    pub fn from_parts(
        cloud_name: Option<String>,
        api_key: Option<String>,
        api_secret: Option<String>,
        base_folder: Option<String>,
    ) -> Option<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(Self {
            cloud_name: non_empty(cloud_name)?,
            api_key: non_empty(api_key)?,
            api_secret: non_empty(api_secret)?,
            base_folder: non_empty(base_folder),
        })
    }

    /// `<base>/<sub>`, skipping empty parts.
    pub fn folder_path(&self, sub: &str) -> String {
        [self.base_folder.as_deref().unwrap_or(""), sub]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Uploads images to Cloudinary; deletes via the `destroy` endpoint.
#[derive(Debug, Clone)]
pub struct CloudinaryBlobStore {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryBlobStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, BlobError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{API_BASE}/{}/image/{action}", self.config.cloud_name)
    }
}

/// SHA-256 request signature: params sorted by key, joined as `k=v&…`,
/// secret appended.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl BlobStore for CloudinaryBlobStore {
    async fn store(&self, bytes: Vec<u8>, meta: &BlobMeta) -> Result<StoredBlob, BlobError> {
        let folder = self.config.folder_path(&meta.folder);
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let file = Part::bytes(bytes)
            .file_name("upload")
            .mime_str(&meta.content_type)?;
        let mut form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        if !folder.is_empty() {
            form = form.text("folder", folder);
        }

        let resp = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BlobError::Remote(format!("upload failed ({status}): {body}")));
        }
        let uploaded: UploadResponse = resp.json().await?;
        Ok(StoredBlob {
            url: uploaded.secure_url,
            public_id: Some(uploaded.public_id),
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), BlobError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );
        let resp = self
            .client
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let destroyed: DestroyResponse = resp.json().await?;
        debug!(public_id, result = %destroyed.result, "cloudinary destroy");
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(BlobError::Remote(format!("destroy returned '{other}'"))),
        }
    }
}
