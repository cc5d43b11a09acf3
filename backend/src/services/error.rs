//! Service error taxonomy shared by the catalog and identity services

use async_graphql::ErrorExtensions;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// No current user for an operation that needs one
    #[error("not authenticated")]
    Unauthorized,

    /// Validation or persistence failure caused by the request arguments
    #[error("{message}")]
    InvalidInput {
        message: String,
        invalid_args: JsonValue,
    },

    /// The book was stored but its author's book list was not updated.
    /// The reconciler repairs this on the next run.
    #[error("book {book_id} was created but not linked to author {author_id}: {source}")]
    AuthorLinkPending {
        book_id: String,
        author_id: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Wrap a persistence failure together with the arguments that caused it
    pub fn invalid_input(cause: impl std::fmt::Display, invalid_args: JsonValue) -> Self {
        Self::InvalidInput {
            message: cause.to_string(),
            invalid_args,
        }
    }

    /// Stable error code exposed to GraphQL clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHENTICATED",
            Self::InvalidInput { .. } => "BAD_USER_INPUT",
            Self::AuthorLinkPending { .. } => "AUTHOR_LINK_PENDING",
            Self::Store(_) | Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

impl ErrorExtensions for ServiceError {
    fn extend(&self) -> async_graphql::Error {
        let message = match self {
            // Internal details stay in the logs
            Self::Store(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "Request failed with internal error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        async_graphql::Error::new(message).extend_with(|_, e| {
            e.set("code", self.code());
            match self {
                Self::InvalidInput { invalid_args, .. } => {
                    if let Ok(args) = async_graphql::Value::from_json(invalid_args.clone()) {
                        e.set("invalidArgs", args);
                    }
                }
                Self::AuthorLinkPending {
                    book_id, author_id, ..
                } => {
                    e.set("bookId", book_id.as_str());
                    e.set("authorId", author_id.as_str());
                }
                _ => {}
            }
        })
    }
}
