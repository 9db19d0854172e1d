//! Administration service
//!
//! User management plus the catalog operations an administrator reaches
//! from the dashboard. Callers gate access on `User::is_admin`; the backend
//! remains the authority and rejects whatever slips through.

use std::sync::Arc;

use tokio::sync::RwLock;
use validator::Validate;

use crate::{
    api::ApiClient,
    error::{AppError, AppResult},
    models::{EntityId, Listing, NewUser, User, UserUpdate},
    session::SessionView,
};

use super::catalog::CatalogController;

pub struct AdminController {
    api: ApiClient,
    session: SessionView,
    catalog: Arc<CatalogController>,
    users: RwLock<Vec<User>>,
}

impl AdminController {
    pub fn new(api: ApiClient, session: SessionView, catalog: Arc<CatalogController>) -> Self {
        Self {
            api,
            session,
            catalog,
            users: RwLock::new(Vec::new()),
        }
    }

    /// Book operations, shared with the regular catalog
    pub fn catalog(&self) -> &CatalogController {
        &self.catalog
    }

    /// Users currently on display
    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = self
            .api
            .get("/users")
            .fallback("Failed to fetch users")
            .send::<Listing<User>>()
            .await?
            .into_items();

        *self.users.write().await = users.clone();
        Ok(users)
    }

    /// Create an account through the registration endpoint
    pub async fn add_user(&self, user: NewUser) -> AppResult<User> {
        user.validate()?;

        let created: User = self
            .api
            .post("/users/register")
            .json(&user)
            .fallback("Failed to add user")
            .send()
            .await?;

        tracing::info!(user_id = %created.id, is_admin = created.is_admin, "Added user");
        self.resync().await;
        Ok(created)
    }

    pub async fn edit_user(&self, id: &EntityId, update: UserUpdate) -> AppResult<User> {
        update.validate()?;

        let updated: User = self
            .api
            .put(format!("/users/{}", id.path_segment()))
            .json(&update)
            .fallback("Failed to update user")
            .send()
            .await?;

        tracing::info!(user_id = %id, is_admin = updated.is_admin, "Updated user");
        self.resync().await;
        Ok(updated)
    }

    /// Delete another user's account. Deleting your own is refused here,
    /// before anything reaches the backend.
    pub async fn delete_user(&self, id: &EntityId) -> AppResult<()> {
        if self.session.user_id().await.as_ref() == Some(id) {
            return Err(AppError::Authorization("You cannot delete your own account".to_string()));
        }

        self.api
            .delete(format!("/users/{}", id.path_segment()))
            .fallback("Failed to delete user")
            .send_empty()
            .await?;

        tracing::info!(user_id = %id, "Deleted user");
        self.resync().await;
        Ok(())
    }

    async fn resync(&self) {
        if let Err(e) = self.list_users().await {
            tracing::warn!(error = %e, "Failed to refresh users after update");
        }
    }
}
