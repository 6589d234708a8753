//! FAQ handlers. JSON bodies, no uploads.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use vitrine_core::content::faqs;
use vitrine_core::models::content::Faq;
use vitrine_core::validation::{Constraints, Rule};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppJson;
use crate::handlers::parse_id;
use crate::models::{FaqRequest, OkResponse};

const QUESTION: &[Rule] = &[Rule::Required, Rule::MinLen(3), Rule::MaxLen(300)];
const ANSWER: &[Rule] = &[Rule::Required, Rule::MinLen(3), Rule::MaxLen(5000)];

fn validate(body: &FaqRequest) -> AppResult<(&str, &str)> {
    Constraints::new()
        .field("question", body.question.as_deref(), QUESTION)
        .field("answer", body.answer.as_deref(), ANSWER)
        .check()?;
    Ok((
        body.question.as_deref().unwrap_or_default(),
        body.answer.as_deref().unwrap_or_default(),
    ))
}

/// `GET /api/faqs`
pub async fn list_faqs_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Faq>>> {
    Ok(Json(faqs::list_faqs(&state.pool).await?))
}

/// `POST /api/faqs`
pub async fn create_faq_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<FaqRequest>,
) -> AppResult<(StatusCode, Json<Faq>)> {
    let (question, answer) = validate(&body)?;
    let faq = faqs::create_faq(&state.pool, question, answer).await?;
    Ok((StatusCode::CREATED, Json(faq)))
}

/// `PUT /api/faqs/{id}`
pub async fn update_faq_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(body): AppJson<FaqRequest>,
) -> AppResult<Json<Faq>> {
    let id = parse_id(&id)?;
    let (question, answer) = validate(&body)?;
    Ok(Json(faqs::update_faq(&state.pool, id, question, answer).await?))
}

/// `DELETE /api/faqs/{id}`
pub async fn delete_faq_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<OkResponse>> {
    let id = parse_id(&id)?;
    faqs::delete_faq(&state.pool, id).await?;
    Ok(Json(OkResponse::ok()))
}
