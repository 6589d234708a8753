//! Blog post persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::products::drain_removed;
use super::{ContentError, PageRequest, SlugOrId, base_slug, unique_slug, with_slug_retry};
use crate::blob::{BlobStore, delete_best_effort};
use crate::models::content::{BlogPost, BlogSummary, Image, Page};
use crate::uuid::uuidv7;

/// Default page size for blog lists.
pub const DEFAULT_LIMIT: i64 = 10;

const TABLE: &str = "blog_posts";

const COLUMNS: &str = "id, title, slug, body, images, published_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct BlogRow {
    id: Uuid,
    title: String,
    slug: String,
    body: String,
    images: Json<Vec<Image>>,
    published_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BlogRow> for BlogPost {
    fn from(row: BlogRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            body: row.body,
            images: row.images.0,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBlogPost {
    pub title: String,
    pub body: String,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default)]
pub struct BlogUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub added_images: Vec<Image>,
    pub remove_public_ids: Vec<String>,
}

/// List posts, most recently published first.
pub async fn list_blogs(pool: &PgPool, page: PageRequest) -> Result<Page<BlogSummary>, ContentError> {
    let rows = sqlx::query_as::<_, BlogRow>(&format!(
        "SELECT {COLUMNS} FROM blog_posts ORDER BY published_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page {
        page: page.page,
        limit: page.limit,
        items: rows
            .into_iter()
            .map(|r| BlogSummary::from(&BlogPost::from(r)))
            .collect(),
    })
}

async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<BlogPost>, ContentError> {
    let row = sqlx::query_as::<_, BlogRow>(&format!("SELECT {COLUMNS} FROM blog_posts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(BlogPost::from))
}

/// Fetch by id when `key` is a UUID, else by slug.
pub async fn get_blog(pool: &PgPool, key: &str) -> Result<BlogPost, ContentError> {
    let found = match SlugOrId::parse(key) {
        SlugOrId::Id(id) => find_by_id(pool, id).await?,
        SlugOrId::Slug(slug) => {
            sqlx::query_as::<_, BlogRow>(&format!("SELECT {COLUMNS} FROM blog_posts WHERE slug = $1"))
                .bind(slug)
                .fetch_optional(pool)
                .await?
                .map(BlogPost::from)
        }
    };
    found.ok_or(ContentError::NotFound)
}

pub async fn create_blog(pool: &PgPool, new: NewBlogPost) -> Result<BlogPost, ContentError> {
    let title = new.title.trim();
    let body = new.body.trim();
    let base = base_slug(title, "b");
    let slug = unique_slug(pool, TABLE, &base, None).await?;
    let sql = format!(
        "INSERT INTO blog_posts (id, title, slug, body, images) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
    );
    let row = with_slug_retry(slug, &base, |slug| {
        sqlx::query_as::<_, BlogRow>(&sql)
            .bind(uuidv7())
            .bind(title)
            .bind(slug)
            .bind(body)
            .bind(Json(&new.images))
            .fetch_one(pool)
    })
    .await?;
    Ok(row.into())
}

pub async fn update_blog(
    pool: &PgPool,
    blobs: &dyn BlobStore,
    id: Uuid,
    update: BlogUpdate,
) -> Result<BlogPost, ContentError> {
    let mut post = find_by_id(pool, id).await?.ok_or(ContentError::NotFound)?;

    let mut base = post.slug.clone();
    if let Some(title) = update.title.map(|t| t.trim().to_string())
        && title != post.title
    {
        base = base_slug(&title, "b");
        post.slug = unique_slug(pool, TABLE, &base, Some(id)).await?;
        post.title = title;
    }
    if let Some(body) = update.body {
        post.body = body.trim().to_string();
    }
    post.images.extend(update.added_images);
    let removed = drain_removed(&mut post.images, &update.remove_public_ids);

    let sql = format!(
        "UPDATE blog_posts \
         SET title = $2, slug = $3, body = $4, images = $5, updated_at = now() \
         WHERE id = $1 RETURNING {COLUMNS}"
    );
    let row = with_slug_retry(post.slug.clone(), &base, |slug| {
        sqlx::query_as::<_, BlogRow>(&sql)
            .bind(id)
            .bind(&post.title)
            .bind(slug)
            .bind(&post.body)
            .bind(Json(&post.images))
            .fetch_optional(pool)
    })
    .await?
    .ok_or(ContentError::NotFound)?;

    for public_id in &removed {
        delete_best_effort(blobs, public_id).await;
    }
    Ok(row.into())
}

/// Delete a post and, best-effort, its stored images.
pub async fn delete_blog(pool: &PgPool, blobs: &dyn BlobStore, id: Uuid) -> Result<(), ContentError> {
    let post = find_by_id(pool, id).await?.ok_or(ContentError::NotFound)?;
    for public_id in post.images.iter().filter_map(|i| i.public_id.as_deref()) {
        delete_best_effort(blobs, public_id).await;
    }
    sqlx::query("DELETE FROM blog_posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
