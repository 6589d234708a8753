//! Image blob stores: local disk or Cloudinary.
//!
//! `store` failures propagate; `delete` failures are swallowed by
//! [`delete_best_effort`].

pub mod cloudinary;
pub mod local;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use cloudinary::{CloudinaryBlobStore, CloudinaryConfig};
pub use local::LocalBlobStore;

/// Largest accepted image, in bytes (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Most images accepted in one request.
pub const MAX_IMAGES_PER_REQUEST: usize = 10;

/// Accepted image content types.
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Blob store errors.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("{0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image host error: {0}")]
    Remote(String),
}

/// Where an upload is going and what it is.
#[derive(Debug, Clone)]
pub struct BlobMeta {
    pub content_type: String,
    /// Logical folder, e.g. `products` or `blogs`.
    pub folder: String,
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    /// Id for later deletion; `None` when the store cannot delete.
    pub public_id: Option<String>,
}

/// Pluggable image storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>, meta: &BlobMeta) -> Result<StoredBlob, BlobError>;

    async fn delete(&self, public_id: &str) -> Result<(), BlobError>;
}

/// Delete a blob, logging instead of failing.
pub async fn delete_best_effort(store: &dyn BlobStore, public_id: &str) {
    if let Err(e) = store.delete(public_id).await {
        warn!(public_id, error = %e, "image delete failed, ignoring");
    }
}

/// File extension for an accepted content type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Check an upload against the type and size limits.
pub fn check_image(content_type: &str, len: usize) -> Result<(), BlobError> {
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(BlobError::Rejected("Only image files allowed".into()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(BlobError::Rejected(format!(
            "Image exceeds {} bytes",
            MAX_IMAGE_BYTES
        )));
    }
    Ok(())
}
