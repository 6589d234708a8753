//! Content domain models: products, blog posts, FAQs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An image attached to a product or blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub url: String,
    /// Blob-store id; absent for local-disk uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub images: Vec<Image>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List entry for products.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            slug: p.slug.clone(),
            cover_image: p.images.first().map(|i| i.url.clone()),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub images: Vec<Image>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List entry for blog posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub cover_image: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl From<&BlogPost> for BlogSummary {
    fn from(b: &BlogPost) -> Self {
        Self {
            id: b.id,
            title: b.title.clone(),
            slug: b.slug.clone(),
            cover_image: b.images.first().map(|i| i.url.clone()),
            published_at: b.published_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A page of list results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub page: i64,
    pub limit: i64,
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(images: Vec<Image>) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: "Lamp".into(),
            slug: "lamp".into(),
            description: "A desk lamp".into(),
            images,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn summary_uses_first_image_as_cover() {
        let p = product(vec![
            Image { url: "/uploads/a.png".into(), public_id: None },
            Image { url: "/uploads/b.png".into(), public_id: None },
        ]);
        let s = ProductSummary::from(&p);
        assert_eq!(s.cover_image.as_deref(), Some("/uploads/a.png"));
    }

    #[test]
    fn summary_without_images_has_no_cover() {
        let s = ProductSummary::from(&product(vec![]));
        assert!(s.cover_image.is_none());
    }

    #[test]
    fn local_image_serializes_without_public_id() {
        let json = serde_json::to_value(Image { url: "/uploads/x.gif".into(), public_id: None })
            .unwrap();
        assert_eq!(json, serde_json::json!({ "url": "/uploads/x.gif" }));
    }
}
