//! Authentication middleware: bearer verification and the admin gate.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use axum::http::header::AUTHORIZATION;
use tracing::{debug, warn};
use vitrine_core::auth::gate;
use vitrine_core::models::auth::AccessClaims;

use crate::AppState;
use crate::error::AppError;

/// Key used to store verified `AccessClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AccessClaims);

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies it as an
/// access token, and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let claims = gate::authenticate(state.sessions.codec(), header).map_err(|e| {
        debug!(path = %request.uri().path(), "rejected bearer: {e}");
        AppError::from(e)
    })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));
    Ok(next.run(request).await)
}

/// Axum middleware: admin role plus network-origin allowlist. Runs after
/// `require_auth`.
///
/// The origin is the first `X-Forwarded-For` entry, else the peer address
/// from `ConnectInfo` when the server was started with it.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    {
        let user = request
            .extensions()
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok());
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let origin = gate::client_origin(forwarded, peer);

        gate::authorize_admin(&user.0, origin.as_deref(), &state.config.ip_allowlist).map_err(
            |e| {
                warn!(sub = %user.0.sub, origin = ?origin, "admin gate rejected: {e}");
                AppError::from(e)
            },
        )?;
    }

    Ok(next.run(request).await)
}
