//! Catalog service: authors, books and their linkage
//!
//! Owns the author/book invariants:
//! - every book references an existing author
//! - an author's book list holds exactly the books pointing back at it
//! - author names are unique; books for a known name attach to that author
//!
//! Book creation publishes a [`CatalogEvent::BookAdded`] on the event bus.

use std::collections::HashMap;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::db::{
    AuthorRecord, BookRecord, CreateAuthor, CreateBook, Database, StoreError, UserRecord,
};

use super::error::{ServiceError, ServiceResult};
use super::events::{CatalogEvent, EventBus};

/// A book with its author populated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookWithAuthor {
    pub book: BookRecord,
    pub author: AuthorRecord,
}

/// Arguments for [`CatalogService::add_book`]
#[derive(Debug, Clone)]
pub struct AddBookInput {
    pub title: String,
    pub author: Option<String>,
    pub published: i32,
    pub genres: Vec<String>,
}

impl AddBookInput {
    fn as_json(&self) -> serde_json::Value {
        json!({
            "title": self.title,
            "author": self.author,
            "published": self.published,
            "genres": self.genres,
        })
    }
}

/// Filter for [`CatalogService::list_books`]. When both fields are set the
/// genre filter wins and the author filter is ignored.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub author: Option<String>,
    pub genre: Option<String>,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Database,
    events: EventBus,
}

impl CatalogService {
    pub fn new(db: Database, events: EventBus) -> Self {
        Self { db, events }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================================================
    // Authors
    // ========================================================================

    /// Find the author with this exact name, creating it if needed.
    ///
    /// Two requests racing to create the same name both end up with the one
    /// record that won the insert: the loser sees the unique-name violation and
    /// reads the winner back.
    pub async fn resolve_or_create_author(&self, name: &str) -> ServiceResult<AuthorRecord> {
        if let Some(author) = self.db.authors().get_by_name(name).await? {
            return Ok(author);
        }

        self.create_author_or_adopt(name).await
    }

    /// Insert an author a lookup just reported missing. If a concurrent
    /// request inserted the name in between, return that record instead.
    async fn create_author_or_adopt(&self, name: &str) -> ServiceResult<AuthorRecord> {
        let authors = self.db.authors();
        let created = authors
            .create(CreateAuthor {
                name: name.to_string(),
                born: None,
            })
            .await;

        match created {
            Ok(author) => {
                info!(author_id = %author.id, name = %author.name, "Author created");
                Ok(author)
            }
            Err(e) if e.is_duplicate() => {
                debug!(name = %name, "Lost author creation race, reading existing record");
                authors.get_by_name(name).await?.ok_or_else(|| {
                    ServiceError::Internal(anyhow::anyhow!(
                        "author '{}' reported as duplicate but not found",
                        name
                    ))
                })
            }
            Err(e) => Err(invalid_store_input(e, json!({ "author": name }))),
        }
    }

    /// Create an author explicitly. Duplicate names are rejected by the store.
    pub async fn add_author(&self, name: &str, born: Option<i32>) -> ServiceResult<AuthorRecord> {
        let author = self
            .db
            .authors()
            .create(CreateAuthor {
                name: name.to_string(),
                born,
            })
            .await
            .map_err(|e| invalid_store_input(e, json!({ "name": name, "born": born })))?;

        info!(author_id = %author.id, name = %author.name, "Author added");
        Ok(author)
    }

    /// Set an author's birth year. Unknown names yield `Ok(None)`.
    pub async fn edit_author(
        &self,
        name: &str,
        set_born_to: i32,
        acting_user: Option<&UserRecord>,
    ) -> ServiceResult<Option<AuthorRecord>> {
        let user = acting_user.ok_or(ServiceError::Unauthorized)?;
        let authors = self.db.authors();

        let Some(author) = authors.get_by_name(name).await? else {
            debug!(name = %name, "editAuthor on unknown author");
            return Ok(None);
        };

        let updated = authors
            .update_born(&author.id, Some(set_born_to))
            .await
            .map_err(|e| {
                invalid_store_input(e, json!({ "name": name, "setBornTo": set_born_to }))
            })?;

        info!(
            author_id = %author.id,
            born = set_born_to,
            user_id = %user.id,
            "Author birth year updated"
        );
        Ok(updated)
    }

    /// All authors in creation order, each with its book list
    pub async fn list_authors(&self) -> ServiceResult<Vec<AuthorRecord>> {
        Ok(self.db.authors().list_all().await?)
    }

    pub async fn count_authors(&self) -> ServiceResult<i64> {
        Ok(self.db.authors().count().await?)
    }

    // ========================================================================
    // Books
    // ========================================================================

    /// Add a book, creating its author on first use.
    ///
    /// Steps run in order: resolve author, store book, link book to author,
    /// publish. A failed link is not rolled back; it is reported as
    /// [`ServiceError::AuthorLinkPending`] and repaired by
    /// [`Self::reconcile_author_books`].
    pub async fn add_book(
        &self,
        input: AddBookInput,
        acting_user: Option<&UserRecord>,
    ) -> ServiceResult<BookWithAuthor> {
        let user = acting_user.ok_or(ServiceError::Unauthorized)?;

        let author_name = match input.author.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                return Err(ServiceError::invalid_input(
                    "author is required",
                    input.as_json(),
                ));
            }
        };

        let author = self.resolve_or_create_author(author_name).await?;

        let book = self
            .db
            .books()
            .create(CreateBook {
                title: input.title.clone(),
                published: input.published,
                author_id: author.id.clone(),
                genres: input.genres.clone(),
            })
            .await
            .map_err(|e| invalid_store_input(e, input.as_json()))?;

        let author = self.link_book(&book, &author).await?;

        info!(
            book_id = %book.id,
            title = %book.title,
            author_id = %author.id,
            user_id = %user.id,
            "Book added"
        );

        let added = BookWithAuthor { book, author };
        let receivers = self.events.publish(CatalogEvent::BookAdded(added.clone()));
        debug!(book_id = %added.book.id, receivers, "Published BookAdded");

        Ok(added)
    }

    /// List books with their authors. See [`BookFilter`] for precedence.
    pub async fn list_books(&self, filter: BookFilter) -> ServiceResult<Vec<BookWithAuthor>> {
        let books = self.db.books();

        let records = match (filter.genre.as_deref(), filter.author.as_deref()) {
            (Some(genre), _) => books.list_by_genre(genre).await?,
            (None, Some(name)) => match self.db.authors().get_by_name(name).await? {
                Some(author) => books.list_by_author(&author.id).await?,
                None => Vec::new(),
            },
            (None, None) => books.list_all().await?,
        };

        self.populate_authors(records).await
    }

    /// Books in the given user's favorite genre
    pub async fn favorite_books(
        &self,
        acting_user: Option<&UserRecord>,
    ) -> ServiceResult<Vec<BookWithAuthor>> {
        let user = acting_user.ok_or(ServiceError::Unauthorized)?;
        self.list_books(BookFilter {
            author: None,
            genre: Some(user.favorite_genre.clone()),
        })
        .await
    }

    pub async fn count_books(&self) -> ServiceResult<i64> {
        Ok(self.db.books().count().await?)
    }

    /// Append every book missing from its author's list. Returns how many
    /// links were repaired.
    pub async fn reconcile_author_books(&self) -> ServiceResult<usize> {
        let unlinked = self.db.books().list_unlinked().await?;
        let authors = self.db.authors();

        let mut repaired = 0;
        for book in &unlinked {
            if authors.append_book(&book.author_id, &book.id).await? {
                repaired += 1;
            }
        }

        if repaired > 0 {
            warn!(repaired, "Repaired missing author-book links");
        }
        Ok(repaired)
    }

    /// Append the book to its author's list and read the author back
    async fn link_book(
        &self,
        book: &BookRecord,
        author: &AuthorRecord,
    ) -> ServiceResult<AuthorRecord> {
        let authors = self.db.authors();
        let pending = |source: StoreError| {
            error!(
                book_id = %book.id,
                author_id = %author.id,
                error = %source,
                "Book stored but author link failed; will be repaired by reconciliation"
            );
            ServiceError::AuthorLinkPending {
                book_id: book.id.clone(),
                author_id: author.id.clone(),
                source,
            }
        };

        authors.append_book(&author.id, &book.id).await.map_err(pending)?;

        // The link is committed; a failed read-back must not fail the add
        match authors.get_by_id(&author.id).await {
            Ok(Some(linked)) => Ok(linked),
            Ok(None) => {
                warn!(author_id = %author.id, book_id = %book.id, "Author missing on read-back after link");
                Ok(with_linked_book(author, &book.id))
            }
            Err(e) => {
                warn!(author_id = %author.id, book_id = %book.id, error = %e, "Author read-back after link failed");
                Ok(with_linked_book(author, &book.id))
            }
        }
    }

    async fn populate_authors(
        &self,
        records: Vec<BookRecord>,
    ) -> ServiceResult<Vec<BookWithAuthor>> {
        let authors = self.db.authors();
        let mut cache: HashMap<String, AuthorRecord> = HashMap::new();
        let mut out = Vec::with_capacity(records.len());

        for book in records {
            let author = match cache.get(&book.author_id) {
                Some(author) => author.clone(),
                None => {
                    let author = authors.get_by_id(&book.author_id).await?.ok_or_else(|| {
                        ServiceError::Internal(anyhow::anyhow!(
                            "book {} references missing author {}",
                            book.id,
                            book.author_id
                        ))
                    })?;
                    cache.insert(author.id.clone(), author.clone());
                    author
                }
            };
            out.push(BookWithAuthor { book, author });
        }

        Ok(out)
    }
}

/// The author as it stands once `book_id` is on its list
fn with_linked_book(author: &AuthorRecord, book_id: &str) -> AuthorRecord {
    let mut linked = author.clone();
    if !linked.books.iter().any(|id| id == book_id) {
        linked.books.push(book_id.to_string());
    }
    linked
}

/// Map validation and uniqueness failures to `InvalidInput`; infrastructure
/// failures stay internal.
fn invalid_store_input(err: StoreError, args: serde_json::Value) -> ServiceError {
    let caused_by_input = match &err {
        StoreError::Duplicate { .. } | StoreError::Invalid { .. } => true,
        StoreError::Sqlx(sqlx::Error::Database(db_err)) => db_err.is_foreign_key_violation(),
        _ => false,
    };

    if caused_by_input {
        ServiceError::invalid_input(err, args)
    } else {
        ServiceError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::CreateUser;

    async fn setup() -> (CatalogService, UserRecord) {
        let db = Database::in_memory().await.unwrap();
        let user = db
            .users()
            .create(CreateUser {
                username: "alice".to_string(),
                favorite_genre: "sci-fi".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (CatalogService::new(db, EventBus::default()), user)
    }

    fn book(title: &str, author: &str, genres: &[&str]) -> AddBookInput {
        AddBookInput {
            title: title.to_string(),
            author: Some(author.to_string()),
            published: 1965,
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_add_book_creates_author_once() {
        let (catalog, user) = setup().await;

        let first = catalog.add_book(book("Dune", "Herbert", &["sci-fi"]), Some(&user)).await.unwrap();
        assert_eq!(first.author.name, "Herbert");
        assert_eq!(first.author.born, None);
        assert_eq!(first.author.books, vec![first.book.id.clone()]);

        let authors = catalog.list_authors().await.unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].book_count(), 1);
    }

    #[tokio::test]
    async fn test_books_for_existing_author_attach_to_same_record() {
        let (catalog, user) = setup().await;
        let rowling = catalog.add_author("Rowling", Some(1965)).await.unwrap();

        let a = catalog.add_book(book("Stone", "Rowling", &[]), Some(&user)).await.unwrap();
        let b = catalog.add_book(book("Chamber", "Rowling", &[]), Some(&user)).await.unwrap();

        assert_eq!(a.author.id, rowling.id);
        assert_eq!(b.author.id, rowling.id);
        assert_eq!(b.author.books, vec![a.book.id, b.book.id]);
        assert_eq!(catalog.count_authors().await.unwrap(), 1);
        assert_eq!(catalog.count_books().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_add_book_requires_user() {
        let (catalog, _) = setup().await;
        assert_matches!(
            catalog.add_book(book("Dune", "Herbert", &[]), None).await,
            Err(ServiceError::Unauthorized)
        );
        assert_eq!(catalog.count_authors().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_book_requires_author_name() {
        let (catalog, user) = setup().await;
        let mut input = book("Dune", "", &[]);
        input.author = None;

        let err = catalog.add_book(input, Some(&user)).await.unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput { ref message, .. } if message == "author is required");
    }

    #[tokio::test]
    async fn test_duplicate_title_is_invalid_input_with_args() {
        let (catalog, user) = setup().await;
        catalog.add_book(book("Dune", "Herbert", &[]), Some(&user)).await.unwrap();

        let err = catalog
            .add_book(book("Dune", "Herbert", &["sci-fi"]), Some(&user))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput { ref invalid_args, .. } => {
            assert_eq!(invalid_args["title"], "Dune");
            assert_eq!(invalid_args["genres"][0], "sci-fi");
        });
        let authors = catalog.list_authors().await.unwrap();
        assert_eq!(authors[0].book_count(), 1);
    }

    #[tokio::test]
    async fn test_add_author_rejects_duplicate_name() {
        let (catalog, _) = setup().await;
        catalog.add_author("Herbert", None).await.unwrap();
        assert_matches!(
            catalog.add_author("Herbert", Some(1920)).await,
            Err(ServiceError::InvalidInput { .. })
        );
    }

    #[tokio::test]
    async fn test_edit_author() {
        let (catalog, user) = setup().await;
        catalog.add_book(book("Dune", "Herbert", &[]), Some(&user)).await.unwrap();

        assert_matches!(
            catalog.edit_author("Herbert", 1920, None).await,
            Err(ServiceError::Unauthorized)
        );
        let edited = catalog.edit_author("Herbert", 1920, Some(&user)).await.unwrap().unwrap();
        assert_eq!(edited.born, Some(1920));
        assert_eq!(edited.book_count(), 1);
        assert!(catalog.edit_author("Nobody", 1900, Some(&user)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_books_filters() {
        let (catalog, user) = setup().await;
        catalog.add_book(book("Dune", "Herbert", &["sci-fi"]), Some(&user)).await.unwrap();
        catalog.add_book(book("Emma", "Austen", &["romance", "classic"]), Some(&user)).await.unwrap();
        catalog.add_book(book("Children of Dune", "Herbert", &["classic"]), Some(&user)).await.unwrap();

        let titles = |list: Vec<BookWithAuthor>| list.into_iter().map(|b| b.book.title).collect::<Vec<_>>();

        assert_eq!(catalog.list_books(BookFilter::default()).await.unwrap().len(), 3);
        assert_eq!(
            titles(catalog.list_books(BookFilter { author: Some("Herbert".into()), genre: None }).await.unwrap()),
            vec!["Dune", "Children of Dune"]
        );
        assert!(catalog
            .list_books(BookFilter { author: Some("Nobody".into()), genre: None })
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            titles(catalog.list_books(BookFilter { author: None, genre: Some("classic".into()) }).await.unwrap()),
            vec!["Emma", "Children of Dune"]
        );
        // genre wins over author
        assert_eq!(
            titles(
                catalog
                    .list_books(BookFilter { author: Some("Herbert".into()), genre: Some("romance".into()) })
                    .await
                    .unwrap()
            ),
            vec!["Emma"]
        );
    }

    #[tokio::test]
    async fn test_favorite_books_uses_user_genre() {
        let (catalog, user) = setup().await;
        catalog.add_book(book("Dune", "Herbert", &["sci-fi"]), Some(&user)).await.unwrap();
        catalog.add_book(book("Emma", "Austen", &["romance"]), Some(&user)).await.unwrap();

        let favorites = catalog.favorite_books(Some(&user)).await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].book.title, "Dune");
        assert_eq!(favorites[0].author.name, "Herbert");

        assert_matches!(catalog.favorite_books(None).await, Err(ServiceError::Unauthorized));
    }

    #[tokio::test]
    async fn test_book_count_matches_back_references() {
        let (catalog, user) = setup().await;
        for (title, author) in [("A", "Herbert"), ("B", "Austen"), ("C", "Herbert"), ("D", "Herbert")] {
            catalog.add_book(book(title, author, &[]), Some(&user)).await.unwrap();
        }

        let books = catalog.list_books(BookFilter::default()).await.unwrap();
        for author in catalog.list_authors().await.unwrap() {
            let pointing_back = books.iter().filter(|b| b.book.author_id == author.id).count();
            assert_eq!(author.book_count(), pointing_back, "author {}", author.name);
        }
    }

    #[tokio::test]
    async fn test_concurrent_adds_for_new_author_share_one_record() {
        let (catalog, user) = setup().await;
        let catalog = Arc::new(catalog);
        let user = Arc::new(user);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let catalog = catalog.clone();
                let user = user.clone();
                tokio::spawn(async move {
                    catalog
                        .add_book(book(&format!("Book {}", i), "Le Guin", &[]), Some(user.as_ref()))
                        .await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let authors = catalog.list_authors().await.unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].book_count(), 6);
    }

    #[tokio::test]
    async fn test_resolve_returns_existing_author() {
        let (catalog, _) = setup().await;
        let winner = catalog.db.authors().create(CreateAuthor { name: "Herbert".into(), born: None }).await.unwrap();
        let resolved = catalog.resolve_or_create_author("Herbert").await.unwrap();
        assert_eq!(resolved.id, winner.id);
    }

    #[tokio::test]
    async fn test_lost_creation_race_adopts_winner() {
        let (catalog, _) = setup().await;
        // The concurrent request inserts after this one's lookup came back empty
        let winner = catalog.add_author("Herbert", Some(1920)).await.unwrap();

        let adopted = catalog.create_author_or_adopt("Herbert").await.unwrap();
        assert_eq!(adopted, winner);
        assert_eq!(catalog.count_authors().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_link_failure_reports_pending_and_reconciles() {
        let (catalog, user) = setup().await;
        let mut events = Box::pin(catalog.events().book_added());
        sqlx::query(
            "CREATE TRIGGER block_links BEFORE INSERT ON author_books \
             BEGIN SELECT RAISE(ABORT, 'links unavailable'); END",
        )
        .execute(catalog.db.pool())
        .await
        .unwrap();

        let err = catalog
            .add_book(book("Dune", "Herbert", &["sci-fi"]), Some(&user))
            .await
            .unwrap_err();
        let ServiceError::AuthorLinkPending { book_id, author_id, .. } = &err else {
            panic!("expected AuthorLinkPending, got {:?}", err);
        };
        let (book_id, author_id) = (book_id.clone(), author_id.clone());

        let gql = async_graphql::ErrorExtensions::extend(&err);
        let ext = gql.extensions.unwrap();
        assert_eq!(ext.get("code"), Some(&async_graphql::Value::from("AUTHOR_LINK_PENDING")));
        assert_eq!(ext.get("bookId"), Some(&async_graphql::Value::from(book_id.as_str())));
        assert_eq!(ext.get("authorId"), Some(&async_graphql::Value::from(author_id.as_str())));

        assert_eq!(catalog.count_books().await.unwrap(), 1);
        let next = tokio::time::timeout(std::time::Duration::from_millis(50), events.next()).await;
        assert!(next.is_err(), "no BookAdded for an unlinked book");

        sqlx::query("DROP TRIGGER block_links")
            .execute(catalog.db.pool())
            .await
            .unwrap();
        assert_eq!(catalog.reconcile_author_books().await.unwrap(), 1);

        let authors = catalog.list_authors().await.unwrap();
        assert_eq!(authors[0].id, author_id);
        assert_eq!(authors[0].books, vec![book_id]);
    }

    #[test]
    fn test_with_linked_book_appends_once() {
        let author = AuthorRecord {
            id: "author-1".to_string(),
            name: "Herbert".to_string(),
            born: None,
            books: vec!["dune".to_string()],
            created_at: "now".to_string(),
            updated_at: "now".to_string(),
        };

        let linked = with_linked_book(&author, "messiah");
        assert_eq!(linked.books, vec!["dune", "messiah"]);
        assert_eq!(with_linked_book(&linked, "messiah").books, linked.books);
    }

    #[tokio::test]
    async fn test_add_book_publishes_event() {
        let (catalog, user) = setup().await;
        let mut events = Box::pin(catalog.events().book_added());

        let added = catalog.add_book(book("Dune", "Herbert", &["sci-fi"]), Some(&user)).await.unwrap();
        let received = events.next().await.unwrap();
        assert_eq!(received, added);
    }

    #[tokio::test]
    async fn test_failed_add_publishes_nothing() {
        let (catalog, user) = setup().await;
        let mut events = Box::pin(catalog.events().book_added());

        let _ = catalog.add_book(book("Dune", "Herbert", &[]), None).await;
        let _ = catalog.add_book(book(" ", "Herbert", &[]), Some(&user)).await;

        let next = tokio::time::timeout(std::time::Duration::from_millis(50), events.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_reconcile_repairs_missing_links() {
        let (catalog, _) = setup().await;
        let author = catalog.add_author("Herbert", None).await.unwrap();
        // A book stored without its link, as left behind by a failed append
        let orphan = catalog
            .db
            .books()
            .create(CreateBook {
                title: "Dune".into(),
                published: 1965,
                author_id: author.id.clone(),
                genres: vec![],
            })
            .await
            .unwrap();

        assert_eq!(catalog.reconcile_author_books().await.unwrap(), 1);
        assert_eq!(catalog.reconcile_author_books().await.unwrap(), 0);

        let authors = catalog.list_authors().await.unwrap();
        assert_eq!(authors[0].books, vec![orphan.id]);
    }
}
