// HTTP access to the sync server with the session's credential attached

use std::{sync::Arc, time::Duration};

use reqwest::{Method, RequestBuilder, header::CONTENT_TYPE};

use crate::{
    domain::SyncDocument,
    error::{ApiError, ApiResult},
    session::SessionStore,
};

pub const AUTH_USER_HEADER: &str = "x-auth-user";
pub const AUTH_KEY_HEADER: &str = "x-auth-key";

pub const DOCUMENTS_ALL_ROUTE: &str = "/api/documents.all";
pub const USERS_AUTH_ROUTE: &str = "/users/auth";

/// Response body classified by its declared content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            json: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }
}

/// Anything the sync coordinator can pull the document list from.
#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_documents(&self) -> ApiResult<Vec<SyncDocument>>;
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    session: Arc<SessionStore>,
    timeout: Duration,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client for the server at `base_url` (e.g. "http://localhost:8081").
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url_str = base_url.into();
        tracing::debug!(base_url = %base_url_str, "creating ApiClient");
        Ok(ApiClient {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            session,
            timeout,
            client,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, route: &str, options: &RequestOptions) -> RequestBuilder {
        let mut req = self.client.request(options.method.clone(), self.url(route));
        for (k, v) in &options.headers {
            req = req.header(k, v);
        }
        if let Some(body) = &options.json {
            req = req.json(body);
        }
        req
    }

    /// Authenticated request. Refused without network I/O when the session is anonymous.
    #[tracing::instrument(level = "debug", skip(self, options), fields(method = %options.method))]
    pub async fn fetch(&self, route: &str, options: RequestOptions) -> ApiResult<Payload> {
        let credential = self.session.credential().await;
        if !credential.is_authenticated() {
            tracing::debug!("refusing request without credentials");
            return Err(ApiError::NotAuthenticated);
        }
        let req = self
            .request(route, &options)
            .header(AUTH_USER_HEADER, &credential.username)
            .header(AUTH_KEY_HEADER, &credential.key);
        self.execute(req).await
    }

    /// Same as [`ApiClient::fetch`] but without session check or auth headers.
    #[tracing::instrument(level = "debug", skip(self, options), fields(method = %options.method))]
    pub async fn fetch_url(&self, route: &str, options: RequestOptions) -> ApiResult<Payload> {
        let req = self.request(route, &options);
        self.execute(req).await
    }

    async fn execute(&self, req: RequestBuilder) -> ApiResult<Payload> {
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(%status, "request failed");
            return Err(ApiError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        if is_json {
            serde_json::from_str(&body)
                .map(Payload::Json)
                .map_err(|e| ApiError::Body(e.to_string()))
        } else {
            Ok(Payload::Text(body))
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Transport(e.to_string())
        }
    }

    /// GET /api/documents.all
    pub async fn documents_all(&self) -> ApiResult<Vec<SyncDocument>> {
        match self.fetch(DOCUMENTS_ALL_ROUTE, RequestOptions::get()).await? {
            Payload::Json(value) => match serde_json::from_value::<Vec<SyncDocument>>(value) {
                Ok(docs) => Ok(docs),
                Err(e) => {
                    tracing::error!(error = %e, "failed to parse document list");
                    Err(ApiError::Body(e.to_string()))
                }
            },
            Payload::Text(body) => {
                let snippet: String = body.chars().take(200).collect();
                tracing::error!(body_snippet = %snippet, "document list was not JSON");
                Err(ApiError::Body("expected a JSON document list".into()))
            }
        }
    }

    /// GET /users/auth; `Ok(())` when the server accepts the session's credential.
    pub async fn verify_credentials(&self) -> ApiResult<()> {
        self.fetch(USERS_AUTH_ROUTE, RequestOptions::get())
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl DocumentSource for ApiClient {
    async fn list_documents(&self) -> ApiResult<Vec<SyncDocument>> {
        self.documents_all().await
    }
}
