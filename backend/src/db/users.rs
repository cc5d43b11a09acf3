//! Users repository for registration and authentication

use sqlx::SqlitePool as Pool;

use super::error::{StoreError, StoreResult};
use super::sqlite_helpers::{new_id, now_iso8601, required_text};

// ============================================================================
// User Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub favorite_genre: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub favorite_genre: String,
    pub password_hash: String,
}

const USER_COLUMNS: &str = "id, username, favorite_genre, password_hash, created_at";

// ============================================================================
// Repository
// ============================================================================

pub struct UsersRepository {
    pool: Pool,
}

impl UsersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new user. Usernames are unique.
    pub async fn create(&self, user: CreateUser) -> StoreResult<UserRecord> {
        required_text("user", "username", &user.username)?;
        required_text("user", "favoriteGenre", &user.favorite_genre)?;

        let id = new_id();
        let now = now_iso8601();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, favorite_genre, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.favorite_genre)
        .bind(&user.password_hash)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "user", "username", &user.username))?;

        Ok(UserRecord {
            id,
            username: user.username,
            favorite_genre: user.favorite_genre,
            password_hash: user.password_hash,
            created_at: now,
        })
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Get user by exact username
    pub async fn get_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
