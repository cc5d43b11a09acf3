//! Authors repository
//!
//! An author's `books` list lives in the `author_books` table, ordered by
//! `position`. It is the authoritative back-reference from author to books;
//! book counts are always derived from it.

use std::collections::HashMap;

use sqlx::SqlitePool as Pool;

use super::error::{StoreError, StoreResult};
use super::sqlite_helpers::{new_id, now_iso8601, required_text};

/// Author record with its ordered book references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRecord {
    pub id: String,
    pub name: String,
    pub born: Option<i32>,
    /// Book ids in the order they were linked
    pub books: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AuthorRecord {
    pub fn book_count(&self) -> usize {
        self.books.len()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuthorRow {
    id: String,
    name: String,
    born: Option<i32>,
    created_at: String,
    updated_at: String,
}

impl AuthorRow {
    fn with_books(self, books: Vec<String>) -> AuthorRecord {
        AuthorRecord {
            id: self.id,
            name: self.name,
            born: self.born,
            books,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateAuthor {
    pub name: String,
    pub born: Option<i32>,
}

const AUTHOR_COLUMNS: &str = "id, name, born, created_at, updated_at";

pub struct AuthorsRepository {
    pool: Pool,
}

impl AuthorsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Insert a new author with an empty book list.
    ///
    /// Names are unique; a clash is reported as [`StoreError::Duplicate`].
    pub async fn create(&self, input: CreateAuthor) -> StoreResult<AuthorRecord> {
        required_text("author", "name", &input.name)?;

        let id = new_id();
        let now = now_iso8601();

        sqlx::query(
            r#"
            INSERT INTO authors (id, name, born, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(&id)
        .bind(&input.name)
        .bind(input.born)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "author", "name", &input.name))?;

        Ok(AuthorRecord {
            id,
            name: input.name,
            born: input.born,
            books: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get an author by ID
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<AuthorRecord>> {
        let row = sqlx::query_as::<_, AuthorRow>(&format!(
            "SELECT {} FROM authors WHERE id = ?",
            AUTHOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.attach_books(row).await
    }

    /// Get an author by exact, case-sensitive name
    pub async fn get_by_name(&self, name: &str) -> StoreResult<Option<AuthorRecord>> {
        let row = sqlx::query_as::<_, AuthorRow>(&format!(
            "SELECT {} FROM authors WHERE name = ?",
            AUTHOR_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        self.attach_books(row).await
    }

    /// List all authors in creation order
    pub async fn list_all(&self) -> StoreResult<Vec<AuthorRecord>> {
        let rows = sqlx::query_as::<_, AuthorRow>(&format!(
            "SELECT {} FROM authors ORDER BY rowid",
            AUTHOR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let links: Vec<(String, String)> = sqlx::query_as(
            "SELECT author_id, book_id FROM author_books ORDER BY author_id, position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut books_by_author: HashMap<String, Vec<String>> = HashMap::new();
        for (author_id, book_id) in links {
            books_by_author.entry(author_id).or_default().push(book_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let books = books_by_author.remove(&row.id).unwrap_or_default();
                row.with_books(books)
            })
            .collect())
    }

    /// Set the birth year. Returns the updated author, or `None` if the id is unknown.
    pub async fn update_born(&self, id: &str, born: Option<i32>) -> StoreResult<Option<AuthorRecord>> {
        let result = sqlx::query("UPDATE authors SET born = ?, updated_at = ? WHERE id = ?")
            .bind(born)
            .bind(now_iso8601())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Append a book to the end of an author's list.
    ///
    /// Appending is idempotent: a book already on the list keeps its position
    /// and `false` is returned.
    pub async fn append_book(&self, author_id: &str, book_id: &str) -> StoreResult<bool> {
        // The link and the author's updated_at commit together
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO author_books (author_id, book_id, position)
            VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM author_books WHERE author_id = ?1)
            )
            "#,
        )
        .bind(author_id)
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        let appended = result.rows_affected() > 0;
        if appended {
            sqlx::query("UPDATE authors SET updated_at = ? WHERE id = ?")
                .bind(now_iso8601())
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(appended)
    }

    /// Ordered book ids for one author
    pub async fn book_ids(&self, author_id: &str) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT book_id FROM author_books WHERE author_id = ? ORDER BY position",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn attach_books(&self, row: Option<AuthorRow>) -> StoreResult<Option<AuthorRecord>> {
        match row {
            Some(row) => {
                let books = self.book_ids(&row.id).await?;
                Ok(Some(row.with_books(books)))
            }
            None => Ok(None),
        }
    }
}
