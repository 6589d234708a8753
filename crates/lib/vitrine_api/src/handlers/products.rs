//! Product handlers. Reads are public; writes sit behind the admin gate and
//! take multipart bodies with an `images` file list.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use vitrine_core::content::PageRequest;
use vitrine_core::content::products::{self, NewProduct, ProductUpdate};
use vitrine_core::models::content::{Page, Product, ProductSummary};
use vitrine_core::validation::{Constraints, Rule};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppQuery;
use crate::handlers::parse_id;
use crate::models::{ListQuery, OkResponse};
use crate::services::uploads;

const FOLDER: &str = "products";

const NAME: &[Rule] = &[Rule::Required, Rule::MinLen(2), Rule::MaxLen(120)];
const DESCRIPTION: &[Rule] = &[Rule::Required, Rule::MinLen(5), Rule::MaxLen(5000)];
const NAME_UPDATE: &[Rule] = &[Rule::MinLen(2), Rule::MaxLen(120)];
const DESCRIPTION_UPDATE: &[Rule] = &[Rule::MinLen(5), Rule::MaxLen(5000)];

/// `GET /api/products?page=&limit=&search=`
pub async fn list_products_handler(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> AppResult<Json<Page<ProductSummary>>> {
    let page = PageRequest::new(query.page, query.limit, products::DEFAULT_LIMIT);
    let items = products::list_products(&state.pool, page, query.search.as_deref()).await?;
    Ok(Json(items))
}

/// `GET /api/products/{id}`: id or slug.
pub async fn get_product_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<Product>> {
    Ok(Json(products::get_product(&state.pool, &key).await?))
}

/// `POST /api/products`
pub async fn create_product_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Product>)> {
    let mut form = uploads::read_form(multipart).await?;
    Constraints::new()
        .field("name", form.field("name"), NAME)
        .field("description", form.field("description"), DESCRIPTION)
        .check()?;

    let pending = std::mem::take(&mut form.images);
    let images = uploads::store_images(state.blobs.as_ref(), pending, FOLDER).await?;
    let new = NewProduct {
        name: form.take("name").unwrap_or_default(),
        description: form.take("description").unwrap_or_default(),
        images: images.clone(),
    };

    match products::create_product(&state.pool, new).await {
        Ok(product) => Ok((StatusCode::CREATED, Json(product))),
        Err(e) => {
            uploads::discard(state.blobs.as_ref(), &images).await;
            Err(e.into())
        }
    }
}

/// `PUT /api/products/{id}`: partial update; `removePublicIds` is a
/// comma-separated list of images to drop.
pub async fn update_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<Product>> {
    let id = parse_id(&id)?;
    let mut form = uploads::read_form(multipart).await?;
    Constraints::new()
        .field("name", form.field("name"), NAME_UPDATE)
        .field("description", form.field("description"), DESCRIPTION_UPDATE)
        .check()?;

    let pending = std::mem::take(&mut form.images);
    let added_images = uploads::store_images(state.blobs.as_ref(), pending, FOLDER).await?;
    let update = ProductUpdate {
        name: form.take("name"),
        description: form.take("description"),
        added_images: added_images.clone(),
        remove_public_ids: uploads::parse_remove_ids(form.field("removePublicIds")),
    };

    match products::update_product(&state.pool, state.blobs.as_ref(), id, update).await {
        Ok(product) => Ok(Json(product)),
        Err(e) => {
            uploads::discard(state.blobs.as_ref(), &added_images).await;
            Err(e.into())
        }
    }
}

/// `DELETE /api/products/{id}`
pub async fn delete_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<OkResponse>> {
    let id = parse_id(&id)?;
    products::delete_product(&state.pool, state.blobs.as_ref(), id).await?;
    Ok(Json(OkResponse::ok()))
}
