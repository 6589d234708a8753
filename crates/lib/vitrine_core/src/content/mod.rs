//! Content persistence: products, blog posts, FAQs.

pub mod blogs;
pub mod faqs;
pub mod products;
pub mod slug;

use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::blob::BlobError;

/// Largest page size a list call will return.
pub const MAX_PAGE_LIMIT: i64 = 50;

/// Content errors.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Not found")]
    NotFound,

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),
}

/// A clamped page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// `page` is at least 1; `limit` falls back to `default_limit` and is
    /// clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Whether a path segment addresses a row by id or by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugOrId<'a> {
    Id(Uuid),
    Slug(&'a str),
}

impl<'a> SlugOrId<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => SlugOrId::Id(id),
            Err(_) => SlugOrId::Slug(raw),
        }
    }
}

/// How many times a slug-bearing write is tried before a collision is
/// reported.
pub(crate) const SLUG_ATTEMPTS: usize = 3;

/// Slug derived from `title` alone, or a time-based fallback when the title
/// has no slug characters.
pub(crate) fn base_slug(title: &str, fallback_prefix: &str) -> String {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        slug::fallback_slug(fallback_prefix)
    } else {
        slug
    }
}

/// `base` if no row other than `exclude` holds it, else `base` with a random
/// suffix.
///
/// `table` is always one of our own constant table names.
pub(crate) async fn unique_slug(
    pool: &PgPool,
    table: &'static str,
    base: &str,
    exclude: Option<Uuid>,
) -> Result<String, ContentError> {
    let taken = sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS(SELECT 1 FROM {table} WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))"
    ))
    .bind(base)
    .bind(exclude)
    .fetch_one(pool)
    .await?;
    Ok(if taken {
        slug::with_random_suffix(base)
    } else {
        base.to_string()
    })
}

/// Whether a write failed on a unique index. Ids are v7 UUIDs, so for the
/// content tables that index is the slug.
pub(crate) fn is_slug_conflict(e: &sqlx::Error) -> bool {
    e.as_database_error().is_some_and(|d| d.is_unique_violation())
}

/// Run `write` with `slug`. A concurrent writer can claim the same slug
/// between the existence check and the write; on that conflict the write is
/// retried with a fresh suffix on `base`.
pub(crate) async fn with_slug_retry<T, F, Fut>(
    mut slug: String,
    base: &str,
    mut write: F,
) -> Result<T, ContentError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    for _ in 1..SLUG_ATTEMPTS {
        match write(slug.clone()).await {
            Err(e) if is_slug_conflict(&e) => {
                debug!(%slug, "slug taken concurrently, retrying");
                slug = slug::with_random_suffix(base);
            }
            other => return other.map_err(ContentError::from),
        }
    }
    write(slug).await.map_err(ContentError::from)
}
