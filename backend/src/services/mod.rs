//! Domain services sitting between the GraphQL gateway and the store

pub mod auth;
pub mod catalog;
pub mod error;
pub mod events;

pub use auth::{AuthConfig, AuthService, TokenClaims, bearer_token};
pub use catalog::{AddBookInput, BookFilter, BookWithAuthor, CatalogService};
pub use error::{ServiceError, ServiceResult};
pub use events::{CatalogEvent, EventBus, EventBusConfig};
