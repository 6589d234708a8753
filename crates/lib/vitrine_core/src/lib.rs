//! # vitrine_core
//!
//! Core domain logic for Vitrine: the auth core (credential store, token
//! codec, refresh ledger, session service, admin gate), content persistence
//! and image blob stores.

pub mod auth;
pub mod blob;
pub mod content;
pub mod migrate;
pub mod models;
pub mod uuid;
pub mod validation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
