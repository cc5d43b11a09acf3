use super::prelude::*;

#[derive(Default)]
pub struct CatalogQueries;

#[Object]
impl CatalogQueries {
    /// Number of books in the catalog
    async fn book_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let catalog = ctx.data_unchecked::<Arc<CatalogService>>();
        let count = catalog.count_books().await.map_err(|e| e.extend())?;
        count_to_int(count)
    }

    /// Number of authors in the catalog
    async fn author_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let catalog = ctx.data_unchecked::<Arc<CatalogService>>();
        let count = catalog.count_authors().await.map_err(|e| e.extend())?;
        count_to_int(count)
    }

    /// List books, optionally filtered by author name or genre.
    /// When both are given only the genre filter applies.
    async fn all_books(
        &self,
        ctx: &Context<'_>,
        author: Option<String>,
        genre: Option<String>,
    ) -> Result<Vec<Book>> {
        let catalog = ctx.data_unchecked::<Arc<CatalogService>>();
        let books = catalog
            .list_books(BookFilter { author, genre })
            .await
            .map_err(|e| e.extend())?;

        Ok(books.into_iter().map(Book::from).collect())
    }

    async fn all_authors(&self, ctx: &Context<'_>) -> Result<Vec<Author>> {
        let catalog = ctx.data_unchecked::<Arc<CatalogService>>();
        let authors = catalog.list_authors().await.map_err(|e| e.extend())?;

        Ok(authors.into_iter().map(Author::from).collect())
    }
}
