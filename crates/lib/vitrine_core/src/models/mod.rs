//! Domain models shared by the auth core and the content layer.

pub mod auth;
pub mod content;
