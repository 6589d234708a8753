//! Multipart forms carrying text fields plus an `images` file list.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use vitrine_core::blob::{
    BlobMeta, BlobStore, MAX_IMAGE_BYTES, MAX_IMAGES_PER_REQUEST, check_image, delete_best_effort,
};
use vitrine_core::models::content::Image;

use crate::error::{AppError, AppResult};

/// Multipart field holding image files.
pub const IMAGES_FIELD: &str = "images";

/// Body limit for upload routes: a full set of images plus room for text.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGES_PER_REQUEST * MAX_IMAGE_BYTES + 1024 * 1024;

/// An accepted image not yet handed to the blob store.
#[derive(Debug)]
pub struct PendingImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    pub images: Vec<PendingImage>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    fn insert_field(&mut self, name: String, value: String) {
        self.fields.insert(name, value);
    }

    fn push_image(&mut self, content_type: String, bytes: Vec<u8>) -> AppResult<()> {
        if self.images.len() >= MAX_IMAGES_PER_REQUEST {
            return Err(AppError::Validation(format!(
                "At most {MAX_IMAGES_PER_REQUEST} images per request"
            )));
        }
        check_image(&content_type, bytes.len())?;
        self.images.push(PendingImage { content_type, bytes });
        Ok(())
    }
}

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::Validation(e.body_text())
}

/// Drain a multipart body. Images are checked for type, size and count as
/// they arrive; any other field is kept as text.
pub async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == IMAGES_FIELD {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            form.push_image(content_type, bytes.to_vec())?;
        } else {
            let value = field.text().await.map_err(bad_multipart)?;
            form.insert_field(name, value);
        }
    }
    Ok(form)
}

/// Store images under `folder`. If one fails, the ones already stored are
/// deleted best-effort before the error is returned.
pub async fn store_images(
    blobs: &dyn BlobStore,
    pending: Vec<PendingImage>,
    folder: &str,
) -> AppResult<Vec<Image>> {
    let mut stored = Vec::with_capacity(pending.len());
    for image in pending {
        let meta = BlobMeta {
            content_type: image.content_type,
            folder: folder.to_string(),
        };
        match blobs.store(image.bytes, &meta).await {
            Ok(blob) => stored.push(Image {
                url: blob.url,
                public_id: blob.public_id,
            }),
            Err(e) => {
                discard(blobs, &stored).await;
                return Err(e.into());
            }
        }
    }
    Ok(stored)
}

/// Best-effort removal of freshly stored images whose row was never written.
pub async fn discard(blobs: &dyn BlobStore, images: &[Image]) {
    for public_id in images.iter().filter_map(|i| i.public_id.as_deref()) {
        delete_best_effort(blobs, public_id).await;
    }
}

/// `removePublicIds` is a comma-separated list.
pub fn parse_remove_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
