//! Vitrine API server binary.
//!
//! Loads `.env`, connects to PostgreSQL, runs migrations, seeds the admin
//! principal when configured, and serves the REST API.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use vitrine_api::AppState;
use vitrine_api::config::ApiConfig;
use vitrine_core::auth::ledger::{PgRefreshLedger, RefreshLedger};
use vitrine_core::auth::principals::PgCredentialStore;
use vitrine_core::blob::BlobStore;
use vitrine_core::blob::cloudinary::CloudinaryBlobStore;
use vitrine_core::blob::local::LocalBlobStore;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "vitrine_server", about = "Vitrine API server")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/vitrine"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vitrine_api=debug,vitrine_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    // TTLs are parsed here; a bad value stops start-up.
    let mut config = ApiConfig::from_env()?;
    config.bind_addr = format!("{}:{}", args.host, args.port);
    config.pg_connection_url = args.database_url;

    info!(
        port = args.port,
        max_connections = args.max_connections,
        access_ttl_secs = config.access_ttl.num_seconds(),
        refresh_ttl_secs = config.refresh_ttl.num_seconds(),
        "starting vitrine_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    vitrine_api::migrate(&pool).await?;

    let blobs: Arc<dyn BlobStore> = match config.cloudinary.clone() {
        Some(cloudinary) => {
            info!(cloud_name = %cloudinary.cloud_name, "image uploads go to Cloudinary");
            Arc::new(CloudinaryBlobStore::new(cloudinary)?)
        }
        None => {
            tokio::fs::create_dir_all(&config.uploads_dir).await?;
            info!(dir = %config.uploads_dir.display(), "image uploads go to local disk");
            Arc::new(LocalBlobStore::new(config.uploads_dir.clone()))
        }
    };

    let ledger = Arc::new(PgRefreshLedger::new(pool.clone()));
    let purged = ledger.purge_expired().await?;
    if purged > 0 {
        info!(purged, "dropped expired refresh tokens");
    }

    let state = AppState::new(
        pool.clone(),
        config.clone(),
        Arc::new(PgCredentialStore::new(pool)),
        ledger,
        blobs,
    )?;

    let created = state
        .sessions
        .bootstrap_admin(config.admin_email.as_deref(), config.admin_password.as_deref())
        .await?;
    if !created && config.admin_email.is_some() != config.admin_password.is_some() {
        warn!("ADMIN_EMAIL and ADMIN_PASSWORD must both be set to bootstrap an admin");
    }
    if config.ip_allowlist.is_empty() {
        warn!("ADMIN_IP_ALLOWLIST is empty; admin routes accept any origin");
    }

    let app = vitrine_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await?;

    Ok(())
}
