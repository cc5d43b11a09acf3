//! GraphQL object types

use async_graphql::{ID, SimpleObject};

use crate::db::{AuthorRecord, UserRecord};
use crate::services::BookWithAuthor;

#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
pub struct Author {
    pub name: String,
    pub id: ID,
    pub born: Option<i32>,
    /// Number of books in the author's book list
    pub book_count: i32,
}

impl From<AuthorRecord> for Author {
    fn from(record: AuthorRecord) -> Self {
        Self {
            book_count: i32::try_from(record.book_count()).unwrap_or(i32::MAX),
            name: record.name,
            id: ID(record.id),
            born: record.born,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
pub struct Book {
    pub title: String,
    pub published: i32,
    pub author: Author,
    pub genres: Vec<String>,
    pub id: ID,
}

impl From<BookWithAuthor> for Book {
    fn from(BookWithAuthor { book, author }: BookWithAuthor) -> Self {
        Self {
            title: book.title,
            published: book.published,
            author: author.into(),
            genres: book.genres,
            id: ID(book.id),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct User {
    pub username: String,
    pub favorite_genre: String,
    pub id: ID,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            username: record.username,
            favorite_genre: record.favorite_genre,
            id: ID(record.id),
        }
    }
}

/// Session token returned by `login`
#[derive(Debug, Clone, SimpleObject)]
pub struct Token {
    pub value: String,
}
