//! Store-level errors
//!
//! Repositories return [`StoreError`] so callers can tell a uniqueness
//! violation apart from a validation failure or a broken connection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write
    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// The document failed field validation before it reached the database
    #[error("invalid {entity}: {reason}")]
    Invalid {
        entity: &'static str,
        reason: String,
    },

    /// A stored row could not be turned back into a record
    #[error("failed to decode {entity} row: {reason}")]
    Decode {
        entity: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            entity,
            reason: reason.into(),
        }
    }

    /// Translate a unique-constraint failure into [`StoreError::Duplicate`],
    /// passing every other error through unchanged.
    pub(crate) fn from_insert(
        err: sqlx::Error,
        entity: &'static str,
        field: &'static str,
        value: &str,
    ) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Self::Duplicate {
                entity,
                field,
                value: value.to_string(),
            },
            _ => Self::Sqlx(err),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
