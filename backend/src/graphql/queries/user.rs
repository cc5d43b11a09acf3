use super::prelude::*;

#[derive(Default)]
pub struct UserQueries;

#[Object]
impl UserQueries {
    /// The current user, or null when the request is anonymous
    async fn me(&self, ctx: &Context<'_>) -> Option<User> {
        ctx.current_user().cloned().map(User::from)
    }

    /// Books in the current user's favorite genre
    async fn favorite_books(&self, ctx: &Context<'_>) -> Result<Option<Vec<Book>>> {
        let catalog = ctx.data_unchecked::<Arc<CatalogService>>();
        let books = catalog
            .favorite_books(ctx.current_user())
            .await
            .map_err(|e| e.extend())?;

        Ok(Some(books.into_iter().map(Book::from).collect()))
    }
}
