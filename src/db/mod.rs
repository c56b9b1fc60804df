//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the storage handle and its queries
//! - `seed.rs`: demo data for local runs

pub mod models;
pub mod schema;
pub mod seed;
pub mod sqlite;

pub use schema::SQLITE_INIT;
pub use sqlite::{ClarityStorage, SqlitePool};
