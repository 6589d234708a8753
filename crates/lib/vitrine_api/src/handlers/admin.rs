//! Admin account handlers. Everything except `__ping` sits behind the
//! admin gate.

use axum::extract::State;
use axum::{Extension, Json};
use uuid::Uuid;
use vitrine_core::models::auth::PrincipalProfile;
use vitrine_core::validation::{Constraints, Rule};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ChangeEmailRequest, ChangePasswordRequest, OkResponse, PingResponse};

const CURRENT_PASSWORD: &[Rule] = &[Rule::Required, Rule::MinLen(8)];
const NEW_EMAIL: &[Rule] = &[Rule::Required, Rule::Email];
const NEW_PASSWORD: &[Rule] = &[Rule::Required, Rule::MinLen(8), Rule::MaxLen(72)];

/// `GET /api/admin/__ping`: unauthenticated reachability check.
pub async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse {
        ok: true,
        base: "/api/admin".into(),
    })
}

/// `GET /api/admin/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<PrincipalProfile>> {
    let profile = state.sessions.me(principal_id(&user)?).await?;
    Ok(Json(profile))
}

/// `PATCH /api/admin/email`: revokes every refresh token on success.
pub async fn change_email_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AppJson(body): AppJson<ChangeEmailRequest>,
) -> AppResult<Json<OkResponse>> {
    Constraints::new()
        .field("currentPassword", body.current_password.as_deref(), CURRENT_PASSWORD)
        .field("newEmail", body.new_email.as_deref(), NEW_EMAIL)
        .check()?;

    state
        .sessions
        .change_email(
            principal_id(&user)?,
            body.current_password.as_deref().unwrap_or_default(),
            body.new_email.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(OkResponse::with_message("Email updated. Please login again.")))
}

/// `PATCH /api/admin/password`: revokes every refresh token on success.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AppJson(body): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<OkResponse>> {
    Constraints::new()
        .field("currentPassword", body.current_password.as_deref(), CURRENT_PASSWORD)
        .field("newPassword", body.new_password.as_deref(), NEW_PASSWORD)
        .check()?;

    state
        .sessions
        .change_password(
            principal_id(&user)?,
            body.current_password.as_deref().unwrap_or_default(),
            body.new_password.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(OkResponse::with_message("Password updated. Please login again.")))
}

fn principal_id(user: &AuthenticatedUser) -> AppResult<Uuid> {
    user.0
        .principal_id()
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))
}
