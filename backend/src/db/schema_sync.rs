//! Schema synchronization for the catalog store
//!
//! Every statement is idempotent (`IF NOT EXISTS`), so syncing runs on each
//! start and against fresh in-memory databases alike. Column renames and type
//! changes are not handled.

use sqlx::SqlitePool;
use tracing::{debug, info};

/// Table definitions in dependency order
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY NOT NULL,
            username TEXT NOT NULL UNIQUE,
            favorite_genre TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "authors",
        r#"
        CREATE TABLE IF NOT EXISTS authors (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL UNIQUE,
            born INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "books",
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL UNIQUE,
            published INTEGER NOT NULL,
            author_id TEXT NOT NULL REFERENCES authors(id),
            genres TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "author_books",
        r#"
        CREATE TABLE IF NOT EXISTS author_books (
            author_id TEXT NOT NULL REFERENCES authors(id),
            book_id TEXT NOT NULL REFERENCES books(id),
            position INTEGER NOT NULL,
            PRIMARY KEY (author_id, book_id)
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_books_author_id ON books(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_author_books_position ON author_books(author_id, position)",
];

/// Result of a schema sync operation
#[derive(Debug, Default)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
}

/// Check if a table exists in the database
async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool, sqlx::Error> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?;

    Ok(result.is_some())
}

/// Create every missing table and index
pub async fn sync_schema(pool: &SqlitePool) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();

    for (table, ddl) in TABLES {
        if table_exists(pool, table).await? {
            continue;
        }
        debug!(table = %table, "Creating table");
        sqlx::query(ddl).execute(pool).await?;
        result.tables_created.push((*table).to_string());
    }

    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    if !result.tables_created.is_empty() {
        info!(tables = ?result.tables_created, "Created tables");
    }

    Ok(result)
}
