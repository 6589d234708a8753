//! Product persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{ContentError, PageRequest, SlugOrId, base_slug, unique_slug, with_slug_retry};
use crate::blob::{BlobStore, delete_best_effort};
use crate::models::content::{Image, Page, Product, ProductSummary};
use crate::uuid::uuidv7;

/// Default page size for product lists.
pub const DEFAULT_LIMIT: i64 = 12;

const TABLE: &str = "products";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    images: Json<Vec<Image>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            images: row.images.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub images: Vec<Image>,
}

/// Partial product update.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Appended after existing images.
    pub added_images: Vec<Image>,
    /// Images with these public ids are dropped and deleted from the store.
    pub remove_public_ids: Vec<String>,
}

/// List products, newest first, optionally filtered by a name substring.
pub async fn list_products(
    pool: &PgPool,
    page: PageRequest,
    search: Option<&str>,
) -> Result<Page<ProductSummary>, ContentError> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let rows = sqlx::query_as::<_, ProductRow>(
        r#"
        SELECT id, name, slug, description, images, created_at, updated_at
        FROM products
        WHERE $1::text IS NULL OR strpos(lower(name), lower($1)) > 0
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(search)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page {
        page: page.page,
        limit: page.limit,
        items: rows
            .into_iter()
            .map(|r| ProductSummary::from(&Product::from(r)))
            .collect(),
    })
}

async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Product>, ContentError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, slug, description, images, created_at, updated_at \
         FROM products WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Product::from))
}

/// Fetch by id when `key` is a UUID, else by slug.
pub async fn get_product(pool: &PgPool, key: &str) -> Result<Product, ContentError> {
    let found = match SlugOrId::parse(key) {
        SlugOrId::Id(id) => find_by_id(pool, id).await?,
        SlugOrId::Slug(slug) => sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, slug, description, images, created_at, updated_at \
             FROM products WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .map(Product::from),
    };
    found.ok_or(ContentError::NotFound)
}

pub async fn create_product(pool: &PgPool, new: NewProduct) -> Result<Product, ContentError> {
    let name = new.name.trim();
    let description = new.description.trim();
    let base = base_slug(name, "p");
    let slug = unique_slug(pool, TABLE, &base, None).await?;
    let row = with_slug_retry(slug, &base, |slug| {
        sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (id, name, slug, description, images)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, slug, description, images, created_at, updated_at
            "#,
        )
        .bind(uuidv7())
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(Json(&new.images))
        .fetch_one(pool)
    })
    .await?;
    Ok(row.into())
}

pub async fn update_product(
    pool: &PgPool,
    blobs: &dyn BlobStore,
    id: Uuid,
    update: ProductUpdate,
) -> Result<Product, ContentError> {
    let mut product = find_by_id(pool, id).await?.ok_or(ContentError::NotFound)?;

    let mut base = product.slug.clone();
    if let Some(name) = update.name.map(|n| n.trim().to_string())
        && name != product.name
    {
        base = base_slug(&name, "p");
        product.slug = unique_slug(pool, TABLE, &base, Some(id)).await?;
        product.name = name;
    }
    if let Some(description) = update.description {
        product.description = description.trim().to_string();
    }
    product.images.extend(update.added_images);
    let removed = drain_removed(&mut product.images, &update.remove_public_ids);

    let row = with_slug_retry(product.slug.clone(), &base, |slug| {
        sqlx::query_as::<_, ProductRow>(
            r#"
            UPDATE products
            SET name = $2, slug = $3, description = $4, images = $5, updated_at = now()
            WHERE id = $1
            RETURNING id, name, slug, description, images, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&product.name)
        .bind(slug)
        .bind(&product.description)
        .bind(Json(&product.images))
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ContentError::NotFound)?;

    // Only once the row no longer references them.
    for public_id in &removed {
        delete_best_effort(blobs, public_id).await;
    }
    Ok(row.into())
}

/// Delete a product and, best-effort, its stored images.
pub async fn delete_product(
    pool: &PgPool,
    blobs: &dyn BlobStore,
    id: Uuid,
) -> Result<(), ContentError> {
    let product = find_by_id(pool, id).await?.ok_or(ContentError::NotFound)?;
    for public_id in product.images.iter().filter_map(|i| i.public_id.as_deref()) {
        delete_best_effort(blobs, public_id).await;
    }
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove images whose public id is listed; return the removed ids.
pub(crate) fn drain_removed(images: &mut Vec<Image>, remove: &[String]) -> Vec<String> {
    if remove.is_empty() {
        return Vec::new();
    }
    let mut removed = Vec::new();
    images.retain(|img| match &img.public_id {
        Some(pid) if remove.iter().any(|r| r == pid) => {
            removed.push(pid.clone());
            false
        }
        _ => true,
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(url: &str, pid: Option<&str>) -> Image {
        Image {
            url: url.into(),
            public_id: pid.map(str::to_string),
        }
    }

    #[test]
    fn drain_removed_only_drops_listed_public_ids() {
        let mut images = vec![
            img("/uploads/a.png", None),
            img("https://cdn/b.png", Some("shop/b")),
            img("https://cdn/c.png", Some("shop/c")),
        ];
        let removed = drain_removed(&mut images, &["shop/b".into(), "missing".into()]);
        assert_eq!(removed, vec!["shop/b".to_string()]);
        assert_eq!(images.len(), 2);
        assert!(images.iter().all(|i| i.public_id.as_deref() != Some("shop/b")));
    }

    #[test]
    fn drain_removed_with_nothing_listed_is_a_no_op() {
        let mut images = vec![img("https://cdn/b.png", Some("shop/b"))];
        assert!(drain_removed(&mut images, &[]).is_empty());
        assert_eq!(images.len(), 1);
    }
}
