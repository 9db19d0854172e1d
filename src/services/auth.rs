//! Authentication service
//!
//! Drives the session through `Unauthenticated -> Validating ->
//! Authenticated`. This is the only code that writes the session store, and
//! every failed transition ends with the session cleared.

use tokio::sync::RwLock;
use validator::Validate;

use crate::{
    api::ApiClient,
    error::{AppError, AppResult},
    models::{NewUser, TokenResponse, User},
    session::{SessionStore, SessionView},
    token,
};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Validating,
    Authenticated,
}

pub struct AuthController {
    api: ApiClient,
    session: SessionStore,
    state: RwLock<AuthState>,
}

impl AuthController {
    pub fn new(api: ApiClient, session: SessionStore) -> Self {
        Self {
            api,
            session,
            state: RwLock::new(AuthState::Unauthenticated),
        }
    }

    pub async fn state(&self) -> AuthState {
        *self.state.read().await
    }

    pub fn session(&self) -> SessionView {
        self.session.view()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.session.get_user().await
    }

    pub async fn is_admin(&self) -> bool {
        self.current_user().await.map(|u| u.is_admin).unwrap_or(false)
    }

    pub async fn require_user(&self) -> AppResult<User> {
        self.current_user()
            .await
            .ok_or_else(|| AppError::Authentication("You must be logged in".to_string()))
    }

    /// Current user, if they hold administrator privileges
    pub async fn require_admin(&self) -> AppResult<User> {
        let user = self.require_user().await?;

        if user.is_admin {
            Ok(user)
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Exchange credentials for a token, resolve the user it belongs to and
    /// store both.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<User> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("Email and password are required".to_string()));
        }

        self.set_state(AuthState::Validating).await;

        let result = match self.authenticate(email, password).await {
            Ok((token, user)) => self.session.set_session(token, user.clone()).await.map(|_| user),
            Err(e) => Err(e),
        };

        match result {
            Ok(user) => {
                self.set_state(AuthState::Authenticated).await;
                tracing::info!(user_id = %user.id, is_admin = user.is_admin, "Logged in");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.reset().await;
                Err(e)
            }
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let response: TokenResponse = self
            .api
            .post("/users/login")
            .anonymous()
            .form(&[("username", email), ("password", password)])
            .fallback("Login failed")
            .send()
            .await?;

        let user_id = token::subject(&response.access_token)?;

        let user: User = self
            .api
            .get(format!("/users/{}", user_id.path_segment()))
            .bearer(&response.access_token)
            .fallback("Failed to get user info")
            .send()
            .await?;

        Ok((response.access_token, user))
    }

    /// Create an account. Does not log in and never touches the session.
    pub async fn register(&self, user: NewUser) -> AppResult<User> {
        user.validate()?;

        let created: User = self
            .api
            .post("/users/register")
            .anonymous()
            .json(&user)
            .fallback("Registration failed")
            .send()
            .await?;

        tracing::info!(user_id = %created.id, "Registered user");
        Ok(created)
    }

    /// Drop the session unconditionally
    pub async fn logout(&self) -> AppResult<()> {
        let result = self.session.clear().await;
        self.set_state(AuthState::Unauthenticated).await;
        tracing::info!("Logged out");
        result
    }

    /// Pick up the session persisted by an earlier run.
    ///
    /// The stored user is trusted as-is. Anything short of a token plus a
    /// readable user record ends in a logout.
    pub async fn restore(&self) -> AuthState {
        let token = match self.session.stored_token().await {
            Ok(Some(token)) if !token.trim().is_empty() => token,
            Ok(Some(_)) => {
                tracing::warn!("Stored token is blank");
                self.reset().await;
                return AuthState::Unauthenticated;
            }
            Ok(None) => {
                self.set_state(AuthState::Unauthenticated).await;
                return AuthState::Unauthenticated;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored session");
                self.reset().await;
                return AuthState::Unauthenticated;
            }
        };

        match self.session.stored_user().await {
            Ok(Some(user)) => {
                tracing::debug!(user_id = %user.id, "Restored session");
                self.session.adopt(token, user).await;
                self.set_state(AuthState::Authenticated).await;
                AuthState::Authenticated
            }
            Ok(None) => {
                tracing::warn!("Stored token has no user record");
                self.reset().await;
                AuthState::Unauthenticated
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored user record is unreadable");
                self.reset().await;
                AuthState::Unauthenticated
            }
        }
    }

    /// Re-fetch the current user from the backend.
    ///
    /// A rejected token ends the session.
    pub async fn refresh_user(&self) -> AppResult<User> {
        let (token, current) = match (self.session.get_token().await, self.session.get_user().await) {
            (Some(token), Some(user)) => (token, user),
            _ => return Err(AppError::Authentication("You must be logged in".to_string())),
        };

        let fetched = self
            .api
            .get(format!("/users/{}", current.id.path_segment()))
            .bearer(&token)
            .fallback("Failed to get user info")
            .send::<User>()
            .await;

        match fetched {
            Ok(user) => {
                if let Err(e) = self.session.set_session(token, user.clone()).await {
                    self.reset().await;
                    return Err(e);
                }
                Ok(user)
            }
            Err(e) if e.is_auth_failure() => {
                tracing::warn!(error = %e, "Session rejected by backend");
                self.reset().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn set_state(&self, state: AuthState) {
        *self.state.write().await = state;
    }

    async fn reset(&self) {
        if let Err(e) = self.session.clear().await {
            tracing::warn!(error = %e, "Failed to clear stored session");
        }
        self.set_state(AuthState::Unauthenticated).await;
    }
}
