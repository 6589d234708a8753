//! Products, blog posts and FAQs on PostgreSQL.

mod common;

use std::sync::Mutex;

use async_trait::async_trait;
use futures::future::join_all;
use uuid::Uuid;
use vitrine_core::blob::{BlobError, BlobMeta, BlobStore, StoredBlob};
use vitrine_core::content::blogs::{self, BlogUpdate, NewBlogPost};
use vitrine_core::content::products::{self, NewProduct, ProductUpdate};
use vitrine_core::content::{ContentError, PageRequest, faqs};
use vitrine_core::models::content::Image;

use common::test_db;

/// Remembers which public ids were deleted.
#[derive(Default)]
struct RecordingStore {
    deleted: Mutex<Vec<String>>,
}

impl RecordingStore {
    fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for RecordingStore {
    async fn store(&self, _bytes: Vec<u8>, meta: &BlobMeta) -> Result<StoredBlob, BlobError> {
        let id = format!("{}/{}", meta.folder, Uuid::new_v4().simple());
        Ok(StoredBlob {
            url: format!("https://cdn.example/{id}.png"),
            public_id: Some(id),
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), BlobError> {
        self.deleted.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

fn image(public_id: &str) -> Image {
    Image {
        url: format!("https://cdn.example/{public_id}.png"),
        public_id: Some(public_id.to_string()),
    }
}

fn lamp(images: Vec<Image>) -> NewProduct {
    NewProduct {
        name: "  Desk Lamp ".into(),
        description: "A lamp for the desk.".into(),
        images,
    }
}

#[tokio::test]
async fn product_crud_round() {
    let Some(db) = test_db().await else { return };
    let blobs = RecordingStore::default();

    let created = products::create_product(&db.pool, lamp(vec![image("products/a")]))
        .await
        .unwrap();
    assert_eq!(created.name, "Desk Lamp");
    assert_eq!(created.slug, "desk-lamp");

    let by_slug = products::get_product(&db.pool, "desk-lamp").await.unwrap();
    let by_id = products::get_product(&db.pool, &created.id.to_string())
        .await
        .unwrap();
    assert_eq!(by_slug.id, created.id);
    assert_eq!(by_id.images, vec![image("products/a")]);

    let updated = products::update_product(
        &db.pool,
        &blobs,
        created.id,
        ProductUpdate {
            name: Some("Floor Lamp".into()),
            added_images: vec![image("products/b")],
            remove_public_ids: vec!["products/a".into()],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.slug, "floor-lamp");
    assert_eq!(updated.description, "A lamp for the desk.");
    assert_eq!(updated.images, vec![image("products/b")]);
    assert_eq!(blobs.deleted(), vec!["products/a".to_string()]);

    products::delete_product(&db.pool, &blobs, created.id).await.unwrap();
    assert_eq!(
        blobs.deleted(),
        vec!["products/a".to_string(), "products/b".to_string()]
    );
    assert!(matches!(
        products::get_product(&db.pool, "floor-lamp").await,
        Err(ContentError::NotFound)
    ));
    assert!(matches!(
        products::delete_product(&db.pool, &blobs, created.id).await,
        Err(ContentError::NotFound)
    ));
}

#[tokio::test]
async fn duplicate_titles_get_distinct_slugs() {
    let Some(db) = test_db().await else { return };

    let first = products::create_product(&db.pool, lamp(vec![])).await.unwrap();
    let second = products::create_product(&db.pool, lamp(vec![])).await.unwrap();
    assert_eq!(first.slug, "desk-lamp");
    assert!(second.slug.starts_with("desk-lamp-"), "{}", second.slug);
}

#[tokio::test]
async fn concurrent_creates_with_one_title_all_succeed() {
    let Some(db) = test_db().await else { return };

    let creates = (0..6).map(|_| products::create_product(&db.pool, lamp(vec![])));
    let created: Vec<_> = join_all(creates)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let mut slugs: Vec<_> = created.iter().map(|p| p.slug.clone()).collect();
    slugs.sort();
    slugs.dedup();
    assert_eq!(slugs.len(), 6);
}

#[tokio::test]
async fn removed_images_survive_a_failed_update() {
    let Some(db) = test_db().await else { return };
    let blobs = RecordingStore::default();
    let product = products::create_product(&db.pool, lamp(vec![image("products/a")]))
        .await
        .unwrap();

    sqlx::query(
        "CREATE FUNCTION reject_update() RETURNS trigger AS $$ \
         BEGIN RAISE EXCEPTION 'updates disabled'; END $$ LANGUAGE plpgsql",
    )
    .execute(&db.pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER products_read_only BEFORE UPDATE ON products \
         FOR EACH ROW EXECUTE FUNCTION reject_update()",
    )
    .execute(&db.pool)
    .await
    .unwrap();

    let result = products::update_product(
        &db.pool,
        &blobs,
        product.id,
        ProductUpdate {
            remove_public_ids: vec!["products/a".into()],
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(result, Err(ContentError::Db(_))));
    assert!(blobs.deleted().is_empty());

    let stored = products::get_product(&db.pool, &product.id.to_string())
        .await
        .unwrap();
    assert_eq!(stored.images, vec![image("products/a")]);
}

#[tokio::test]
async fn updating_a_missing_product_is_not_found() {
    let Some(db) = test_db().await else { return };
    let blobs = RecordingStore::default();
    assert!(matches!(
        products::update_product(&db.pool, &blobs, Uuid::new_v4(), ProductUpdate::default()).await,
        Err(ContentError::NotFound)
    ));
}

#[tokio::test]
async fn product_list_pages_and_searches() {
    let Some(db) = test_db().await else { return };
    for name in ["Desk Lamp", "Floor Lamp", "Oak Table"] {
        products::create_product(
            &db.pool,
            NewProduct {
                name: name.into(),
                description: "Something nice.".into(),
                images: vec![],
            },
        )
        .await
        .unwrap();
    }

    let lamps = products::list_products(&db.pool, PageRequest::new(None, None, 12), Some("LAMP"))
        .await
        .unwrap();
    assert_eq!(lamps.items.len(), 2);

    let page = products::list_products(&db.pool, PageRequest::new(Some(2), Some(2), 12), None)
        .await
        .unwrap();
    assert_eq!(page.page, 2);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn blog_update_and_delete_clean_up_images() {
    let Some(db) = test_db().await else { return };
    let blobs = RecordingStore::default();

    let post = blogs::create_blog(
        &db.pool,
        NewBlogPost {
            title: "Spring Collection".into(),
            body: "Everything new this spring.".into(),
            images: vec![image("blogs/a"), image("blogs/b")],
        },
    )
    .await
    .unwrap();
    assert_eq!(post.slug, "spring-collection");
    assert_eq!(blogs::get_blog(&db.pool, "spring-collection").await.unwrap().id, post.id);

    let updated = blogs::update_blog(
        &db.pool,
        &blobs,
        post.id,
        BlogUpdate {
            body: Some("Updated body text.".into()),
            remove_public_ids: vec!["blogs/a".into()],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.slug, "spring-collection");
    assert_eq!(updated.images, vec![image("blogs/b")]);
    assert_eq!(blobs.deleted(), vec!["blogs/a".to_string()]);

    blogs::delete_blog(&db.pool, &blobs, post.id).await.unwrap();
    assert_eq!(blobs.deleted(), vec!["blogs/a".to_string(), "blogs/b".to_string()]);
}

#[tokio::test]
async fn faq_lifecycle() {
    let Some(db) = test_db().await else { return };

    let faq = faqs::create_faq(&db.pool, " Do you ship? ", " Yes, worldwide. ")
        .await
        .unwrap();
    assert_eq!(faq.question, "Do you ship?");

    let updated = faqs::update_faq(&db.pool, faq.id, "Do you ship abroad?", "Yes.")
        .await
        .unwrap();
    assert_eq!(updated.answer, "Yes.");
    assert_eq!(faqs::list_faqs(&db.pool).await.unwrap().len(), 1);

    faqs::delete_faq(&db.pool, faq.id).await.unwrap();
    assert!(matches!(
        faqs::delete_faq(&db.pool, faq.id).await,
        Err(ContentError::NotFound)
    ));
    assert!(matches!(
        faqs::update_faq(&db.pool, faq.id, "q?", "a").await,
        Err(ContentError::NotFound)
    ));
}
