//! Backend API gateway
//!
//! Every call to the catalog backend goes through [`ApiClient`], which
//! attaches the bearer token and turns non-success answers into typed
//! [`AppError`]s. Actual I/O sits behind the [`Transport`] trait.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    session::SessionView,
};

pub use http::HttpTransport;

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

/// A request as handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the configured endpoint, e.g. `/books/1/borrow`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub bearer: Option<String>,
}

/// Raw backend answer
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse>;
}

/// Which token, if any, goes in the `Authorization` header
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    Anonymous,
    /// The session token, when one exists
    Session,
    /// An explicit token, used before the session holds it
    Bearer(String),
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: SessionView,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: SessionView) -> Self {
        Self { transport, session }
    }

    pub fn get(&self, path: impl Into<String>) -> Call<'_> {
        self.call(Method::GET, path)
    }

    pub fn post(&self, path: impl Into<String>) -> Call<'_> {
        self.call(Method::POST, path)
    }

    pub fn put(&self, path: impl Into<String>) -> Call<'_> {
        self.call(Method::PUT, path)
    }

    pub fn delete(&self, path: impl Into<String>) -> Call<'_> {
        self.call(Method::DELETE, path)
    }

    fn call(&self, method: Method, path: impl Into<String>) -> Call<'_> {
        Call {
            client: self,
            method,
            path: path.into(),
            query: Vec::new(),
            body: Ok(RequestBody::Empty),
            credentials: Credentials::Session,
            fallback: "Request failed",
        }
    }
}

/// A request being built; consumed by [`Call::send`] or [`Call::send_empty`]
pub struct Call<'a> {
    client: &'a ApiClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: AppResult<RequestBody>,
    credentials: Credentials,
    fallback: &'static str,
}

impl<'a> Call<'a> {
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = serde_json::to_value(body)
            .map(RequestBody::Json)
            .map_err(AppError::from);
        self
    }

    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Ok(RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn anonymous(self) -> Self {
        self.credentials(Credentials::Anonymous)
    }

    pub fn bearer(self, token: &str) -> Self {
        self.credentials(Credentials::Bearer(token.to_string()))
    }

    /// Message used when the error body carries none
    pub fn fallback(mut self, message: &'static str) -> Self {
        self.fallback = message;
        self
    }

    /// Send and decode the JSON answer
    pub async fn send<T: DeserializeOwned>(self) -> AppResult<T> {
        let response = self.dispatch().await?;
        let body = response.body.trim();
        let body = if body.is_empty() { "null" } else { body };
        Ok(serde_json::from_str(body)?)
    }

    /// Send and ignore whatever the backend answers on success
    pub async fn send_empty(self) -> AppResult<()> {
        self.dispatch().await.map(|_| ())
    }

    async fn dispatch(self) -> AppResult<ApiResponse> {
        let bearer = match self.credentials {
            Credentials::Anonymous => None,
            Credentials::Session => self.client.session.token().await,
            Credentials::Bearer(token) => Some(token),
        };

        let request = ApiRequest {
            method: self.method,
            path: self.path,
            query: self.query,
            body: self.body?,
            bearer,
        };

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            authenticated = request.bearer.is_some(),
            "Sending request"
        );

        let method = request.method.clone();
        let path = request.path.clone();
        let response = self.client.transport.send(request).await.map_err(|e| {
            tracing::warn!(%method, %path, error = %e, "Request did not complete");
            e
        })?;

        tracing::debug!(%method, %path, status = response.status, "Received response");

        if !response.is_success() {
            let message = error_message(&response.body).unwrap_or_else(|| self.fallback.to_string());
            tracing::warn!(%method, %path, status = response.status, %message, "Backend rejected request");
            return Err(AppError::from_status(response.status, message));
        }

        Ok(response)
    }
}

/// Extract a human-readable message from an error body.
///
/// Looks at `detail` (a string, or a list of `{msg}` objects), then
/// `message`, then `error`.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    match value.get("detail") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Array(entries)) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.get("msg").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
        _ => {}
    }

    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
