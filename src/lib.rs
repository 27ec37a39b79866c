//! wordquest - vocabulary-learning backend
//!
//! A small REST/JSON service for a vocabulary-learning app: a word catalog
//! with per-user progress, quiz logging, an XP/level reward loop with daily
//! streaks and achievements, a virtual pet, and admin analytics. Everything
//! is stored in a single embedded SQLite database.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (tiny_http) -> auth (bearer token) -> domain service -> SQLite
//! ```
//!
//! Each handler runs its writes inside one rusqlite transaction, so progress
//! upserts, counter recomputes, and level updates land together or not at all.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod pet;
pub mod progress;
pub mod rewards;
pub mod server;
pub mod words;

pub use config::Config;
pub use db::Database;
pub use error::ApiError;
