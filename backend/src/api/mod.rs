//! API route definitions
//!
//! The catalog API is GraphQL at /graphql. The only REST endpoints are the
//! health probes.

pub mod graphql;
pub mod health;
