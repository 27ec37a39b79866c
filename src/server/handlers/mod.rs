//! Request handlers, one module per domain.

pub mod analytics;
pub mod auth;
pub mod pet;
pub mod progress;
pub mod words;
