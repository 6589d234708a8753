//! Admin gate rules: bearer extraction, access-token verification, role and
//! network-origin checks. Transport-agnostic; `vitrine_api` wires these into
//! axum middleware.

use std::net::IpAddr;

use super::AuthError;
use super::jwt::TokenCodec;
use crate::models::auth::{AccessClaims, Role};

/// Pull the token out of an `Authorization: Bearer <token>` header value.
/// The scheme is matched case-insensitively.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?.trim();
    let (scheme, token) = header
        .split_once(char::is_whitespace)
        .ok_or(AuthError::MissingToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Verify the bearer token in `header` as an access token.
pub fn authenticate(codec: &TokenCodec, header: Option<&str>) -> Result<AccessClaims, AuthError> {
    let token = extract_bearer(header)?;
    codec.verify_access(token).map_err(|_| AuthError::InvalidToken)
}

/// Address prefixes allowed to reach admin operations.
///
/// Matching is a plain string prefix test, so `10.0.` admits `10.0.0.0/16`
/// and `192.168.1.1` also admits `192.168.1.100`. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpAllowlist {
    prefixes: Vec<String>,
}

impl IpAllowlist {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list, ignoring blanks.
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.is_empty() || self.prefixes.iter().any(|p| origin.starts_with(p.as_str()))
    }
}

/// Map loopback and IPv4-mapped IPv6 forms onto plain IPv4 text.
pub fn normalize_ip(ip: &str) -> String {
    let ip = ip.trim();
    if ip == "::1" || ip == "0:0:0:0:0:0:0:1" {
        return "127.0.0.1".to_string();
    }
    if let Some(v4) = ip.strip_prefix("::ffff:") {
        return v4.to_string();
    }
    ip.to_string()
}

/// The caller's apparent address: first `X-Forwarded-For` entry, else the
/// direct peer.
pub fn client_origin(forwarded_for: Option<&str>, peer: Option<IpAddr>) -> Option<String> {
    let forwarded = forwarded_for
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());
    match forwarded {
        Some(first) => Some(normalize_ip(first)),
        None => peer.map(|ip| normalize_ip(&ip.to_string())),
    }
}

/// Admin-only policy: admin role, then network origin.
pub fn authorize_admin(
    claims: &AccessClaims,
    origin: Option<&str>,
    allowlist: &IpAllowlist,
) -> Result<(), AuthError> {
    if claims.role != Role::Admin {
        return Err(AuthError::Forbidden("Forbidden".into()));
    }
    if allowlist.is_empty() {
        return Ok(());
    }
    match origin {
        Some(origin) if allowlist.allows(origin) => Ok(()),
        _ => Err(AuthError::Forbidden("Admin IP not allowed".into())),
    }
}
