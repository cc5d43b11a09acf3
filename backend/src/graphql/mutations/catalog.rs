//! Catalog mutations
//!
//! `addBook` and `editAuthor` require a current user; `addAuthor` does not.

use crate::graphql::queries::prelude::*;
use crate::services::AddBookInput;

#[derive(Default)]
pub struct CatalogMutations;

#[Object]
impl CatalogMutations {
    /// Add a book, creating its author on first use
    async fn add_book(
        &self,
        ctx: &Context<'_>,
        title: String,
        author: Option<String>,
        published: i32,
        genres: Vec<String>,
    ) -> Result<Option<Book>> {
        let catalog = ctx.data_unchecked::<Arc<CatalogService>>();
        let input = AddBookInput {
            title,
            author,
            published,
            genres,
        };

        let added = catalog
            .add_book(input, ctx.current_user())
            .await
            .map_err(|e| e.extend())?;

        Ok(Some(added.into()))
    }

    async fn add_author(
        &self,
        ctx: &Context<'_>,
        name: String,
        born: Option<i32>,
    ) -> Result<Option<Author>> {
        let catalog = ctx.data_unchecked::<Arc<CatalogService>>();
        let author = catalog
            .add_author(&name, born)
            .await
            .map_err(|e| e.extend())?;

        Ok(Some(author.into()))
    }

    /// Set an author's birth year. Returns null for unknown names.
    async fn edit_author(
        &self,
        ctx: &Context<'_>,
        name: String,
        set_born_to: i32,
    ) -> Result<Option<Author>> {
        let catalog = ctx.data_unchecked::<Arc<CatalogService>>();
        let author = catalog
            .edit_author(&name, set_born_to, ctx.current_user())
            .await
            .map_err(|e| e.extend())?;

        Ok(author.map(Author::from))
    }
}
