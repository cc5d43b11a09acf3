//! GraphQL API with subscriptions for real-time updates
//!
//! Queries, mutations and the `bookAdded` subscription are split into
//! per-domain `#[derive(Default)]` objects and merged in `schema.rs`.

pub mod auth;
pub mod mutations;
pub mod queries;
mod schema;
mod subscriptions;
pub mod types;

pub use auth::{AuthExt, CurrentUser, user_data};
pub use schema::{BookshelfSchema, build_schema};
