//! User model and related types

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::EntityId;

/// User as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Registration request, also used by admins to add accounts
#[derive(Clone, Serialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub is_admin: bool,
}

impl NewUser {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        is_admin: bool,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password: password.into(),
            is_admin,
        }
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"********")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// Admin edit of an existing user
#[derive(Debug, Clone, Serialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub is_admin: bool,
}

impl UserUpdate {
    pub fn new(name: impl Into<String>, is_admin: bool) -> Self {
        Self {
            name: name.into().trim().to_string(),
            is_admin,
        }
    }
}

/// Login endpoint response
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Books currently borrowed by a user
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserBooks {
    pub user_id: EntityId,
    #[serde(default)]
    pub books: Vec<EntityId>,
}
