//! # vitrine_api
//!
//! HTTP API library for Vitrine.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, request::Parts};
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, delete, get, patch, post, put};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use vitrine_core::auth::AuthError;
use vitrine_core::auth::jwt::TokenCodec;
use vitrine_core::auth::ledger::RefreshLedger;
use vitrine_core::auth::principals::CredentialStore;
use vitrine_core::auth::session::SessionService;
use vitrine_core::blob::BlobStore;
use vitrine_core::blob::local::UPLOADS_URL_PREFIX;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, blogs, faqs, health, products};
use crate::middleware::auth::{require_admin, require_auth};
use crate::services::uploads::UPLOAD_BODY_LIMIT;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
    /// Login, refresh rotation and credential changes.
    pub sessions: SessionService,
    /// Image storage for products and blog posts.
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Wire the session service from `config` over the given stores.
    pub fn new(
        pool: PgPool,
        config: ApiConfig,
        principals: Arc<dyn CredentialStore>,
        ledger: Arc<dyn RefreshLedger>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(
            config.access_secret.clone(),
            config.refresh_secret.clone(),
            config.access_ttl,
            config.refresh_ttl,
        );
        let sessions = SessionService::new(principals, ledger, codec, config.bcrypt_cost)?;
        Ok(Self {
            pool,
            config,
            sessions,
            blobs,
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `vitrine_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    vitrine_core::migrate::migrate(pool).await
}

/// Whether a browser origin may call the API: localhost on any port, or a
/// configured prefix.
pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    const LOCAL: [&str; 4] = [
        "http://localhost",
        "https://localhost",
        "http://127.0.0.1",
        "https://127.0.0.1",
    ];
    let local = LOCAL.iter().any(|base| {
        origin
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
    });
    local || allowed.iter().any(|prefix| origin.starts_with(prefix.as_str()))
}

fn cors_layer(allowed: &[String]) -> CorsLayer {
    let allowed = allowed.to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| origin_allowed(origin, &allowed))
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Admin-only: bearer check first, then role + origin.
    let admin_only = |route: MethodRouter<AppState>| {
        route
            .route_layer(from_fn_with_state(state.clone(), require_admin))
            .route_layer(from_fn_with_state(state.clone(), require_auth))
    };
    let upload = |route: MethodRouter<AppState>| {
        admin_only(route.layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)))
    };

    let api = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/refresh", post(auth::refresh_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/admin/__ping", get(admin::ping_handler))
        .route("/api/admin/me", admin_only(get(admin::me_handler)))
        .route("/api/admin/email", admin_only(patch(admin::change_email_handler)))
        .route(
            "/api/admin/password",
            admin_only(patch(admin::change_password_handler)),
        )
        .route(
            "/api/products",
            get(products::list_products_handler)
                .merge(upload(post(products::create_product_handler))),
        )
        .route(
            "/api/products/{id}",
            get(products::get_product_handler)
                .merge(upload(put(products::update_product_handler)))
                .merge(admin_only(delete(products::delete_product_handler))),
        )
        .route(
            "/api/blogs",
            get(blogs::list_blogs_handler).merge(upload(post(blogs::create_blog_handler))),
        )
        .route(
            "/api/blogs/{id}",
            get(blogs::get_blog_handler)
                .merge(upload(put(blogs::update_blog_handler)))
                .merge(admin_only(delete(blogs::delete_blog_handler))),
        )
        .route(
            "/api/faqs",
            get(faqs::list_faqs_handler).merge(admin_only(post(faqs::create_faq_handler))),
        )
        .route(
            "/api/faqs/{id}",
            admin_only(put(faqs::update_faq_handler).delete(faqs::delete_faq_handler)),
        );

    let uploads = ServeDir::new(&state.config.uploads_dir);

    api.nest_service(UPLOADS_URL_PREFIX, uploads)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_origins_are_always_allowed() {
        assert!(origin_allowed("http://localhost:5173", &[]));
        assert!(origin_allowed("http://127.0.0.1", &[]));
        assert!(!origin_allowed("http://localhost.evil.example", &[]));
    }

    #[test]
    fn configured_prefixes_are_allowed() {
        let allowed = vec!["https://shop.example".to_string()];
        assert!(origin_allowed("https://shop.example", &allowed));
        assert!(!origin_allowed("https://other.example", &allowed));
    }
}
