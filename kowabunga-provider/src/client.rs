//! HTTP client for the Kowabunga REST API
//!
//! Every call is authenticated with the `X-API-Key` header and rooted at
//! `<uri>/api/v1`. Collections return arrays of opaque IDs; objects are JSON.

use std::borrow::Cow;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Path prefix of the versioned API
pub const API_PREFIX: &str = "/api/v1";

/// Header carrying the API token
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Query string parameters
pub type Query<'a> = &'a [(&'a str, String)];

/// Error returned by the API client
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid API endpoint '{0}'")]
    InvalidUri(String),

    #[error("invalid API path '{0}'")]
    InvalidPath(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("API request failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("failed to reach API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Percent-encode a path parameter so it stays a single segment
pub fn segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Dot segments would be resolved away by the URL parser
fn check_path(path: &str) -> Result<(), ApiError> {
    if path
        .split('/')
        .any(|part| matches!(part, "." | ".." | "%2e" | "%2E"))
    {
        return Err(ApiError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Sanitize response body for logging
fn sanitize_for_log(body: &str) -> String {
    let truncated: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
    let truncated = if truncated.len() < body.len() {
        format!("{}... [truncated, {} bytes total]", truncated, body.len())
    } else {
        truncated
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull the human message out of an error body, falling back to the raw text
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(msg) = json.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    // Empty bodies (204, bare 200) decode as JSON null
    if body.trim().is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_str(body)?)
}

/// HTTP client wrapper for Kowabunga API calls
#[derive(Clone)]
pub struct KowabungaClient {
    http: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for KowabungaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KowabungaClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl KowabungaClient {
    /// Create a client for the Kowabunga instance at `uri`
    pub fn new(uri: &str, token: &str) -> Result<Self, ApiError> {
        let parsed = url::Url::parse(uri).map_err(|_| ApiError::InvalidUri(uri.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUri(uri.to_string()));
        }

        let http = Client::builder()
            .user_agent(concat!("kowabunga-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}{}", uri.trim_end_matches('/'), API_PREFIX),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: Option<serde_json::Value>,
    ) -> Result<String, ApiError> {
        check_path(path)?;
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, &self.token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("{} not found", url);
            return Err(ApiError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&text, status),
            });
        }

        Ok(text)
    }

    /// GET an object
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path, &[], None).await?;
        decode(&body)
    }

    /// GET a collection of opaque IDs
    pub async fn list_ids(&self, path: &str) -> Result<Vec<String>, ApiError> {
        let ids: Option<Vec<String>> = self.get(path).await?;
        Ok(ids.unwrap_or_default())
    }

    /// POST an object, returning the created one
    pub async fn post<B, T>(&self, path: &str, query: Query<'_>, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_value(body)?;
        let text = self.send(Method::POST, path, query, Some(payload)).await?;
        decode(&text)
    }

    /// PUT a whole object, returning the updated one
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_value(body)?;
        let text = self.send(Method::PUT, path, &[], Some(payload)).await?;
        decode(&text)
    }

    /// PUT without a body (default flags, token and password actions)
    pub async fn put_action(&self, path: &str, query: Query<'_>) -> Result<(), ApiError> {
        self.send(Method::PUT, path, query, None).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, &[], None).await?;
        Ok(())
    }
}
