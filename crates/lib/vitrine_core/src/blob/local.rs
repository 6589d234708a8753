//! Local-disk blob store serving files from `/uploads`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};

use super::{BlobError, BlobMeta, BlobStore, StoredBlob, extension_for};

/// URL prefix under which the uploads directory is served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Writes uploads into a flat directory. Files carry no public id, so
/// deletion is a no-op.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// `<millis>_<6 random chars>.<ext>`
fn file_name(ext: &str) -> String {
    let suffix: String = rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}_{suffix}.{ext}", Utc::now().timestamp_millis())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: Vec<u8>, meta: &BlobMeta) -> Result<StoredBlob, BlobError> {
        let ext = extension_for(&meta.content_type).unwrap_or("bin");
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = file_name(ext);
        tokio::fs::write(self.dir.join(&name), bytes).await?;
        Ok(StoredBlob {
            url: format!("{UPLOADS_URL_PREFIX}/{name}"),
            public_id: None,
        })
    }

    async fn delete(&self, _public_id: &str) -> Result<(), BlobError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_under_uploads_with_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(tmp.path().join("uploads"));
        let meta = BlobMeta {
            content_type: "image/png".into(),
            folder: "products".into(),
        };

        let blob = store.store(b"\x89PNG".to_vec(), &meta).await.unwrap();
        assert!(blob.url.starts_with("/uploads/"));
        assert!(blob.url.ends_with(".png"));
        assert!(blob.public_id.is_none());

        let name = blob.url.trim_start_matches("/uploads/");
        let written = tokio::fs::read(store.dir().join(name)).await.unwrap();
        assert_eq!(written, b"\x89PNG");
    }

    #[test]
    fn file_names_are_unique_enough() {
        let a = file_name("gif");
        let b = file_name("gif");
        assert_ne!(a, b);
        assert!(a.ends_with(".gif"));
    }
}
