//! Blog post handlers. Reads are public; writes sit behind the admin gate.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use vitrine_core::content::PageRequest;
use vitrine_core::content::blogs::{self, BlogUpdate, NewBlogPost};
use vitrine_core::models::content::{BlogPost, BlogSummary, Page};
use vitrine_core::validation::{Constraints, Rule};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppQuery;
use crate::handlers::parse_id;
use crate::models::{ListQuery, OkResponse};
use crate::services::uploads;

const FOLDER: &str = "blogs";

const TITLE: &[Rule] = &[Rule::Required, Rule::MinLen(3), Rule::MaxLen(200)];
const BODY: &[Rule] = &[Rule::Required, Rule::MinLen(10)];
const TITLE_UPDATE: &[Rule] = &[Rule::MinLen(3), Rule::MaxLen(200)];
const BODY_UPDATE: &[Rule] = &[Rule::MinLen(10)];

/// `GET /api/blogs?page=&limit=`: most recently published first.
pub async fn list_blogs_handler(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> AppResult<Json<Page<BlogSummary>>> {
    let page = PageRequest::new(query.page, query.limit, blogs::DEFAULT_LIMIT);
    Ok(Json(blogs::list_blogs(&state.pool, page).await?))
}

/// `GET /api/blogs/{id}`: id or slug.
pub async fn get_blog_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<BlogPost>> {
    Ok(Json(blogs::get_blog(&state.pool, &key).await?))
}

/// `POST /api/blogs`
pub async fn create_blog_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<BlogPost>)> {
    let mut form = uploads::read_form(multipart).await?;
    Constraints::new()
        .field("title", form.field("title"), TITLE)
        .field("body", form.field("body"), BODY)
        .check()?;

    let pending = std::mem::take(&mut form.images);
    let images = uploads::store_images(state.blobs.as_ref(), pending, FOLDER).await?;
    let new = NewBlogPost {
        title: form.take("title").unwrap_or_default(),
        body: form.take("body").unwrap_or_default(),
        images: images.clone(),
    };

    match blogs::create_blog(&state.pool, new).await {
        Ok(post) => Ok((StatusCode::CREATED, Json(post))),
        Err(e) => {
            uploads::discard(state.blobs.as_ref(), &images).await;
            Err(e.into())
        }
    }
}

/// `PUT /api/blogs/{id}`
pub async fn update_blog_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<BlogPost>> {
    let id = parse_id(&id)?;
    let mut form = uploads::read_form(multipart).await?;
    Constraints::new()
        .field("title", form.field("title"), TITLE_UPDATE)
        .field("body", form.field("body"), BODY_UPDATE)
        .check()?;

    let pending = std::mem::take(&mut form.images);
    let added_images = uploads::store_images(state.blobs.as_ref(), pending, FOLDER).await?;
    let update = BlogUpdate {
        title: form.take("title"),
        body: form.take("body"),
        added_images: added_images.clone(),
        remove_public_ids: uploads::parse_remove_ids(form.field("removePublicIds")),
    };

    match blogs::update_blog(&state.pool, state.blobs.as_ref(), id, update).await {
        Ok(post) => Ok(Json(post)),
        Err(e) => {
            uploads::discard(state.blobs.as_ref(), &added_images).await;
            Err(e.into())
        }
    }
}

/// `DELETE /api/blogs/{id}`
pub async fn delete_blog_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<OkResponse>> {
    let id = parse_id(&id)?;
    blogs::delete_blog(&state.pool, state.blobs.as_ref(), id).await?;
    Ok(Json(OkResponse::ok()))
}
