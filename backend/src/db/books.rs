//! Books repository

use sqlx::SqlitePool as Pool;

use super::error::{StoreError, StoreResult};
use super::sqlite_helpers::{json_to_strings, new_id, now_iso8601, required_text, strings_to_json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub published: i32,
    pub author_id: String,
    pub genres: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: String,
    title: String,
    published: i32,
    author_id: String,
    genres: String,
    created_at: String,
}

impl TryFrom<BookRow> for BookRecord {
    type Error = StoreError;

    fn try_from(row: BookRow) -> StoreResult<Self> {
        Ok(Self {
            genres: json_to_strings("book", &row.genres)?,
            id: row.id,
            title: row.title,
            published: row.published,
            author_id: row.author_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateBook {
    pub title: String,
    pub published: i32,
    pub author_id: String,
    pub genres: Vec<String>,
}

const BOOK_COLUMNS: &str = "id, title, published, author_id, genres, created_at";

/// Drop duplicate genres, keeping the first occurrence of each
fn dedupe_genres(genres: Vec<String>) -> StoreResult<Vec<String>> {
    let mut unique: Vec<String> = Vec::with_capacity(genres.len());
    for genre in genres {
        required_text("book", "genre", &genre)?;
        if !unique.contains(&genre) {
            unique.push(genre);
        }
    }
    Ok(unique)
}

fn into_records(rows: Vec<BookRow>) -> StoreResult<Vec<BookRecord>> {
    rows.into_iter().map(BookRecord::try_from).collect()
}

pub struct BooksRepository {
    pool: Pool,
}

impl BooksRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Insert a new book. Titles are unique.
    pub async fn create(&self, input: CreateBook) -> StoreResult<BookRecord> {
        required_text("book", "title", &input.title)?;
        let genres = dedupe_genres(input.genres)?;

        let id = new_id();
        let now = now_iso8601();

        sqlx::query(
            r#"
            INSERT INTO books (id, title, published, author_id, genres, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&input.title)
        .bind(input.published)
        .bind(&input.author_id)
        .bind(strings_to_json(&genres)?)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "book", "title", &input.title))?;

        Ok(BookRecord {
            id,
            title: input.title,
            published: input.published,
            author_id: input.author_id,
            genres,
            created_at: now,
        })
    }

    /// All books in insertion order
    pub async fn list_all(&self) -> StoreResult<Vec<BookRecord>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {} FROM books ORDER BY rowid",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    /// Books whose genre list contains `genre` (exact, case-sensitive)
    pub async fn list_by_genre(&self, genre: &str) -> StoreResult<Vec<BookRecord>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            SELECT {} FROM books
            WHERE EXISTS (SELECT 1 FROM json_each(books.genres) WHERE json_each.value = ?)
            ORDER BY rowid
            "#,
            BOOK_COLUMNS
        ))
        .bind(genre)
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    /// Books referencing the given author id
    pub async fn list_by_author(&self, author_id: &str) -> StoreResult<Vec<BookRecord>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {} FROM books WHERE author_id = ? ORDER BY rowid",
            BOOK_COLUMNS
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    /// Books missing from their author's book list
    pub async fn list_unlinked(&self) -> StoreResult<Vec<BookRecord>> {
        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT b.id, b.title, b.published, b.author_id, b.genres, b.created_at
            FROM books b
            LEFT JOIN author_books ab ON ab.book_id = b.id AND ab.author_id = b.author_id
            WHERE ab.book_id IS NULL
            ORDER BY b.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
