pub mod catalog;
pub mod user;

pub use catalog::CatalogQueries;
pub use user::UserQueries;

pub(crate) mod prelude {
    pub(crate) use std::sync::Arc;

    pub(crate) use async_graphql::{Context, ErrorExtensions, Object, Result};

    pub(crate) use crate::graphql::auth::AuthExt;
    pub(crate) use crate::graphql::types::*;
    pub(crate) use crate::services::{AuthService, BookFilter, CatalogService};

    /// Convert a count from the store into a GraphQL `Int`
    pub(crate) fn count_to_int(count: i64) -> Result<i32> {
        i32::try_from(count).map_err(|_| async_graphql::Error::new("count exceeds Int range"))
    }
}
