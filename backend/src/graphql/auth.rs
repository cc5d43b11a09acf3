//! Current-user context for GraphQL operations
//!
//! The HTTP and WebSocket handlers resolve the bearer token once and attach
//! the result as [`CurrentUser`] request data. Resolvers read it through
//! [`AuthExt`] and hand it to the services, which decide whether a user is
//! required.

use async_graphql::{Context, Data};

use crate::db::UserRecord;

/// The authenticated user for the current request or connection
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

/// Request data carrying the user, or nothing for anonymous callers
pub fn user_data(user: Option<UserRecord>) -> Data {
    let mut data = Data::default();
    if let Some(user) = user {
        data.insert(CurrentUser(user));
    }
    data
}

/// Extension trait to get the current user from GraphQL context
pub trait AuthExt {
    /// The current user, or `None` for anonymous requests
    fn current_user(&self) -> Option<&UserRecord>;
}

impl<'a> AuthExt for Context<'a> {
    fn current_user(&self) -> Option<&UserRecord> {
        self.data_opt::<CurrentUser>().map(|current| &current.0)
    }
}
