//! Bookshelf - GraphQL catalog of books and authors
//!
//! Layers, from the wire inwards: `api` (axum routes), `graphql` (schema and
//! resolvers), `services` (catalog, identity and event bus), `db` (SQLite
//! repositories).

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod graphql;
pub mod services;

pub use app::{AppState, build_app};
