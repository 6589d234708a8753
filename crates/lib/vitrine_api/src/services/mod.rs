//! Request-side helpers shared by handlers.

pub mod uploads;
