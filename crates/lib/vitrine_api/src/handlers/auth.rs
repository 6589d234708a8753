//! Session request handlers: login, refresh, logout.

use axum::Json;
use axum::extract::State;
use vitrine_core::validation::{Constraints, Rule};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppJson;
use crate::models::{LoginRequest, OkResponse, RefreshRequest, TokenResponse};

const EMAIL: &[Rule] = &[Rule::Required, Rule::Email];
const PASSWORD: &[Rule] = &[Rule::Required, Rule::MinLen(8)];
const REFRESH_TOKEN: &[Rule] = &[Rule::Required, Rule::MinLen(10)];

/// `POST /api/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    Constraints::new()
        .field("email", body.email.as_deref(), EMAIL)
        .field("password", body.password.as_deref(), PASSWORD)
        .check()?;

    let pair = state
        .sessions
        .login(
            body.email.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(pair.into()))
}

/// `POST /api/auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = refresh_token(&body)?;
    let pair = state.sessions.refresh(token).await?;
    Ok(Json(pair.into()))
}

/// `POST /api/auth/logout`: forget a refresh token. Always `{ok: true}` for
/// a well-formed body.
pub async fn logout_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<RefreshRequest>,
) -> AppResult<Json<OkResponse>> {
    let token = refresh_token(&body)?;
    state.sessions.logout(token).await?;
    Ok(Json(OkResponse::ok()))
}

fn refresh_token(body: &RefreshRequest) -> AppResult<&str> {
    Constraints::new()
        .field("refreshToken", body.refresh_token.as_deref(), REFRESH_TOKEN)
        .check()?;
    Ok(body.refresh_token.as_deref().unwrap_or_default())
}
