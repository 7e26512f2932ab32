//! HTTP client adapter for the Mini CMS API.
//!
//! DESIGN
//! ======
//! Thin wrapper over `reqwest` bound to one base URL. The bearer token is
//! pulled from an injected [`TokenSource`] right before each request is sent,
//! so the session store stays the only authority on credentials and no
//! shared default-header state exists on the client.
//!
//! ERROR HANDLING
//! ==============
//! Nothing is retried or swallowed here. Transport failures, timeouts and
//! non-2xx responses all come back as [`ApiError`] for the caller to judge.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("request failed with status {status}")]
    Status { status: u16, body: Value, detail: Option<String> },

    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl ApiError {
    /// Server-supplied `detail` message, if the response carried one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() { Self::Timeout } else { Self::Transport(e.to_string()) }
    }
}

// =============================================================================
// TOKEN SOURCE
// =============================================================================

/// Supplies the current bearer token at request time.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, for callers that hold a token without a session store.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// One outbound call. Headers set here win over the client defaults.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), headers: HeaderMap::new(), body: None }
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` for an empty body.
    pub data: Value,
}

impl ApiResponse {
    /// Deserialize the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] if the body does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.data).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_token_source", &self.tokens.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client with JSON content type and the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone(), tokens: None })
    }

    #[must_use]
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The `Authorization` value the next request would carry.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        self.tokens
            .as_ref()
            .and_then(|source| source.bearer_token())
            .filter(|token| !token.is_empty())
            .map(|token| format!("Bearer {token}"))
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    #[must_use]
    pub fn resolve_file_url(&self, path: &str) -> String {
        resolve_file_url(&self.base_url, path)
    }

    /// Send a request and return the parsed body of a 2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, timeout, or non-2xx status.
    pub async fn request(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self.http.request(req.method.clone(), self.url(&req.path));
        builder = self.intercept(builder, req.headers)?;
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        tracing::debug!(method = %req.method, path = %req.path, "api request");
        Self::dispatch(builder).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::new(Method::GET, path)).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`]. Also fails if `body` cannot be serialized.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request(ApiRequest::new(Method::POST, path).json(body)).await
    }

    /// Post a multipart form. The form's own content type replaces the JSON default.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post_multipart(&self, path: &str, form: reqwest::multipart::Form) -> Result<ApiResponse, ApiError> {
        let builder = self.http.post(self.url(path));
        let builder = self.intercept(builder, HeaderMap::new())?.multipart(form);
        tracing::debug!(method = "POST", %path, "api multipart request");
        Self::dispatch(builder).await
    }

    /// Per-request header injection: caller headers, then the bearer token.
    fn intercept(
        &self,
        builder: reqwest::RequestBuilder,
        headers: HeaderMap,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let mut builder = builder.headers(headers);
        if let Some(value) = self.authorization() {
            builder = builder.header(AUTHORIZATION, HeaderValue::from_str(&value)?);
        }
        Ok(builder)
    }

    async fn dispatch(builder: reqwest::RequestBuilder) -> Result<ApiResponse, ApiError> {
        let response = builder.send().await.map_err(|e| ApiError::from_reqwest(&e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::from_reqwest(&e))?;

        if !(200..300).contains(&status) {
            let body = parse_body_lenient(&text);
            let detail = body.get("detail").and_then(Value::as_str).map(str::to_owned);
            return Err(ApiError::Status { status, body, detail });
        }

        let data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?
        };
        Ok(ApiResponse { status, data })
    }
}

/// Error bodies may be plain text; keep them as a JSON string.
fn parse_body_lenient(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with('/') { format!("{base_url}{path}") } else { format!("{base_url}/{path}") }
}

/// Turn a stored file path into a link.
///
/// Empty input gives `#`. Paths already starting with `http:`/`https:`
/// (any case) are returned as is; anything else is joined onto `base_url`.
#[must_use]
pub fn resolve_file_url(base_url: &str, path: &str) -> String {
    if path.is_empty() {
        return "#".to_owned();
    }
    if has_http_scheme(path) {
        return path.to_owned();
    }
    join_url(base_url, path)
}

fn has_http_scheme(path: &str) -> bool {
    let bytes = path.as_bytes();
    ["http:", "https:"]
        .iter()
        .any(|scheme| bytes.len() >= scheme.len() && bytes[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes()))
}
