pub mod auth;
pub mod catalog;

pub use auth::AuthMutations;
pub use catalog::CatalogMutations;
