//! Book model and related types

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use super::EntityId;

/// Availability as reported by backends that track a status string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Borrowed,
}

/// Book as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Single category or a list, depending on the backend
    #[serde(default, deserialize_with = "one_or_many")]
    pub category: Vec<String>,
    #[serde(default, rename = "is_borrowed")]
    pub borrowed_flag: bool,
    #[serde(default)]
    pub status: Option<BookStatus>,
    #[serde(default)]
    pub borrowed_by: Option<EntityId>,
}

impl Book {
    /// Borrowed state, whichever way the backend reports it
    pub fn is_borrowed(&self) -> bool {
        self.borrowed_flag
            || self.status == Some(BookStatus::Borrowed)
            || self.borrowed_by.is_some()
    }

    /// Case-insensitive substring match on the title
    pub fn title_matches(&self, term: &str) -> bool {
        self.title.to_lowercase().contains(&term.to_lowercase())
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

/// Add-book request.
///
/// Backends that assign ids take `{title, author, category, description?}`;
/// backends that expect a client-chosen id accept `{id, title}` alone.
#[derive(Debug, Clone, Serialize, Validate)]
#[validate(schema(function = "validate_new_book", skip_on_field_errors = false))]
pub struct NewBook {
    /// Client-chosen id, for backends that do not generate one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: Option<String>,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: Some(author.into()),
            description: None,
            category: Some(category.into()),
        }
    }

    /// `{id, title}` body for backends that take a client-chosen id
    pub fn titled(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: title.into(),
            author: None,
            description: None,
            category: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Trim every field; blank optional fields are dropped
    pub fn normalized(self) -> Self {
        fn trimmed(s: Option<String>) -> Option<String> {
            s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }

        Self {
            id: trimmed(self.id),
            title: self.title.trim().to_string(),
            author: trimmed(self.author),
            description: trimmed(self.description),
            category: trimmed(self.category),
        }
    }
}

/// Without a client-chosen id the backend needs author and category
fn validate_new_book(book: &NewBook) -> Result<(), ValidationError> {
    if book.id.is_some() {
        return Ok(());
    }

    let mut missing = Vec::new();
    if book.author.is_none() {
        missing.push("Author is required");
    }
    if book.category.is_none() {
        missing.push("Category is required");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("book_shape").with_message(Cow::Owned(missing.join("; "))))
    }
}

/// Borrow request body
#[derive(Debug, Clone, Serialize)]
pub struct BorrowRequest {
    pub user_id: EntityId,
}
