//! API server configuration.

use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;
use vitrine_core::auth::gate::IpAllowlist;
use vitrine_core::auth::jwt::resolve_secret;
use vitrine_core::auth::password::BCRYPT_COST;
use vitrine_core::auth::ttl::{TtlError, parse_ttl};
use vitrine_core::blob::cloudinary::CloudinaryConfig;

/// Default access-token lifetime.
pub const DEFAULT_ACCESS_TTL: &str = "15m";
/// Default refresh-token lifetime.
pub const DEFAULT_REFRESH_TTL: &str = "7d";

/// Configuration errors. Any of these aborts start-up.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {source}")]
    Ttl {
        var: &'static str,
        #[source]
        source: TtlError,
    },

    #[error("{var}: '{raw}' is shorter than one second")]
    TtlTooShort { var: &'static str, raw: String },
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Access-token signing secret.
    pub access_secret: String,
    /// Refresh-token signing secret.
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
    /// Bootstrap admin credentials; both must be set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub ip_allowlist: IpAllowlist,
    /// CORS origin prefixes in addition to localhost.
    pub allowed_origins: Vec<String>,
    /// Local upload directory, served at `/uploads`.
    pub uploads_dir: PathBuf,
    /// Cloudinary credentials; `None` means local disk uploads.
    pub cloudinary: Option<CloudinaryConfig>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                | Default                                  |
    /// |-------------------------|------------------------------------------|
    /// | `BIND_ADDR`             | `0.0.0.0:8080`                           |
    /// | `DATABASE_URL`          | `postgres://localhost:5432/vitrine`      |
    /// | `JWT_ACCESS_SECRET`     | generated & persisted to file            |
    /// | `JWT_REFRESH_SECRET`    | generated & persisted to file            |
    /// | `ACCESS_TTL`            | `15m`                                    |
    /// | `REFRESH_TTL`           | `7d`                                     |
    /// | `ADMIN_EMAIL`           | unset                                    |
    /// | `ADMIN_PASSWORD`        | unset                                    |
    /// | `ADMIN_IP_ALLOWLIST`    | empty                                    |
    /// | `ALLOWED_ORIGINS`       | empty                                    |
    /// | `UPLOADS_DIR`           | `./uploads`                              |
    /// | `CLOUDINARY_*`          | unset                                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            pg_connection_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/vitrine".into()),
            access_secret: resolve_secret("JWT_ACCESS_SECRET", "jwt-access-secret"),
            refresh_secret: resolve_secret("JWT_REFRESH_SECRET", "jwt-refresh-secret"),
            access_ttl: ttl_from("ACCESS_TTL", var("ACCESS_TTL").as_deref(), DEFAULT_ACCESS_TTL)?,
            refresh_ttl: ttl_from(
                "REFRESH_TTL",
                var("REFRESH_TTL").as_deref(),
                DEFAULT_REFRESH_TTL,
            )?,
            bcrypt_cost: BCRYPT_COST,
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
            ip_allowlist: IpAllowlist::from_csv(&var("ADMIN_IP_ALLOWLIST").unwrap_or_default()),
            allowed_origins: split_csv(&var("ALLOWED_ORIGINS").unwrap_or_default()),
            uploads_dir: var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            cloudinary: CloudinaryConfig::from_parts(
                var("CLOUDINARY_CLOUD_NAME"),
                var("CLOUDINARY_API_KEY"),
                var("CLOUDINARY_API_SECRET"),
                var("CLOUDINARY_FOLDER"),
            ),
        })
    }
}

/// Parse a TTL value, falling back to `default` when unset.
///
/// Token claims carry whole seconds, so anything under one second is refused.
pub fn ttl_from(var: &'static str, raw: Option<&str>, default: &str) -> Result<Duration, ConfigError> {
    let raw = raw.unwrap_or(default);
    let ttl = parse_ttl(raw).map_err(|source| ConfigError::Ttl { var, source })?;
    if ttl < Duration::seconds(1) {
        return Err(ConfigError::TtlTooShort {
            var,
            raw: raw.to_string(),
        });
    }
    Ok(ttl)
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
