//! GraphQL authentication mutations
//!
//! Neither mutation requires authentication.

use crate::graphql::queries::prelude::*;

#[derive(Default)]
pub struct AuthMutations;

#[Object]
impl AuthMutations {
    /// Register a new user. Without a password the server's initial
    /// password is assigned.
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        favorite_genre: String,
        password: Option<String>,
    ) -> Result<Option<User>> {
        let auth = ctx.data_unchecked::<Arc<AuthService>>();
        let user = auth
            .create_user(&username, &favorite_genre, password.as_deref())
            .await
            .map_err(|e| e.extend())?;

        Ok(Some(user.into()))
    }

    /// Exchange credentials for a session token
    async fn login(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> Result<Option<Token>> {
        let auth = ctx.data_unchecked::<Arc<AuthService>>();
        let value = auth
            .login(&username, &password)
            .await
            .map_err(|e| e.extend())?;

        Ok(Some(Token { value }))
    }
}
