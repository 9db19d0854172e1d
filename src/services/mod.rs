//! Controllers driving the catalog backend

pub mod admin;
pub mod auth;
pub mod catalog;

use std::sync::Arc;

use crate::{
    api::{ApiClient, HttpTransport, Transport},
    config::{AppConfig, SearchMode},
    error::AppResult,
    session::{self, SessionStorage, SessionStore},
};

pub use admin::AdminController;
pub use auth::{AuthController, AuthState};
pub use catalog::CatalogController;

/// Container for all controllers
pub struct Services {
    pub auth: AuthController,
    pub catalog: Arc<CatalogController>,
    pub admin: AdminController,
}

impl Services {
    /// Build the controllers from configuration
    pub async fn new(config: &AppConfig) -> AppResult<Self> {
        let storage = session::open_storage(&config.session).await?;
        let transport = Arc::new(HttpTransport::new(&config.api)?);
        Ok(Self::with_parts(transport, storage, config.api.search_mode))
    }

    /// Build the controllers over an existing transport and storage
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        storage: Arc<dyn SessionStorage>,
        search_mode: SearchMode,
    ) -> Self {
        let store = SessionStore::new(storage);
        let view = store.view();
        let api = ApiClient::new(transport, view.clone());

        let catalog = Arc::new(CatalogController::new(api.clone(), view.clone(), search_mode));
        let admin = AdminController::new(api.clone(), view, catalog.clone());
        let auth = AuthController::new(api, store);

        Self { auth, catalog, admin }
    }
}
