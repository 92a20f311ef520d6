//! reqwest implementation of the book service.

use super::BooksService;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::library::UploadFile;
use crate::models::{BookRecord, ProgressPatch, ProgressRecord};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Book service reached over HTTP.
#[derive(Clone, Debug)]
pub struct HttpBooksService {
    base_url: String,
    token: Option<String>,
    device_id: Option<String>,
    client: reqwest::Client,
}

impl HttpBooksService {
    /// Create a client for the given base URL (e.g. "http://localhost:8080").
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into();
        tracing::debug!(base_url = %base_url, "Creating book service client");

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            device_id: None,
            client,
        })
    }

    /// Build a client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut service = Self::new(
            &config.server.base_url,
            Duration::from_secs(config.server.timeout_seconds),
        )?;
        if let Some(token) = config.server.token.as_deref().filter(|t| !t.is_empty()) {
            service = service.with_token(token);
        }
        if let Some(device_id) = config.client.device_id.as_deref() {
            service = service.with_device_id(device_id);
        }
        Ok(service)
    }

    /// Return a client with the provided bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Return a client that identifies itself with a device ID.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn progress_url(&self, book_id: &str) -> String {
        self.url(&format!("/api/progress/{}", urlencoding::encode(book_id)))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        if let Some(ref device_id) = self.device_id {
            req = req.header("X-Device-Id", device_id);
        }
        req
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let snippet: String = body.chars().take(500).collect();
            tracing::error!(error = %e, body_snippet = %snippet, "Failed to parse response");
            AppError::Json(e)
        })
    }
}

/// Map a non-success response to an error.
fn status_error(status: StatusCode, body: String) -> AppError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        extract_message(&body)
    };

    match status {
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        _ => AppError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull `error` or `message` out of a JSON error body, else use the body as is.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("detail"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl BooksService for HttpBooksService {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch_progress(&self, book_id: &str) -> Result<ProgressRecord> {
        let url = self.progress_url(book_id);
        tracing::debug!(%url, "GET progress");
        self.send_json(self.request(reqwest::Method::GET, &url))
            .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn write_progress(
        &self,
        book_id: &str,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord> {
        let url = self.progress_url(book_id);
        tracing::debug!(%url, "PUT progress");
        self.send_json(self.request(reqwest::Method::PUT, &url).json(patch))
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, file), fields(file = %file.name, size = file.size()))]
    async fn upload_file(&self, file: &UploadFile) -> Result<BookRecord> {
        let url = self.url("/api/books/upload");
        let part = Part::bytes(file.data.clone())
            .file_name(file.name.clone())
            .mime_str(file.format.mime_type())?;
        let form = Form::new().part("file", part);
        self.send_json(self.request(reqwest::Method::POST, &url).multipart(form))
            .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_books(&self) -> Result<Vec<BookRecord>> {
        let url = self.url("/api/books");
        self.send_json(self.request(reqwest::Method::GET, &url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> HttpBooksService {
        HttpBooksService::new("http://localhost:8080/shelf/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn url_joins_paths() {
        let s = service();
        assert_eq!(s.url("/api/books"), "http://localhost:8080/shelf/api/books");
        assert_eq!(s.url("api/books"), "http://localhost:8080/shelf/api/books");
    }

    #[test]
    fn progress_url_encodes_book_id() {
        let s = service();
        assert_eq!(
            s.progress_url("my book/1"),
            "http://localhost:8080/shelf/api/progress/my%20book%2F1"
        );
    }

    #[test]
    fn from_config_sets_credentials() {
        let mut config = Config::default();
        config.server.token = Some("secret".into());
        config.client.device_id = Some("device-1".into());

        let s = HttpBooksService::from_config(&config).unwrap();
        assert_eq!(s.token.as_deref(), Some("secret"));
        assert_eq!(s.device_id.as_deref(), Some("device-1"));

        let req = s
            .request(reqwest::Method::GET, &s.url("/api/books"))
            .build()
            .unwrap();
        assert_eq!(req.headers()["authorization"], "Bearer secret");
        assert_eq!(req.headers()["x-device-id"], "device-1");
    }

    #[test]
    fn empty_token_is_ignored() {
        let mut config = Config::default();
        config.server.token = Some(String::new());

        let s = HttpBooksService::from_config(&config).unwrap();
        assert!(s.token.is_none());
        assert!(s.device_id.is_none());

        let req = s
            .request(reqwest::Method::GET, &s.url("/api/books"))
            .build()
            .unwrap();
        assert!(req.headers().get("authorization").is_none());
    }

    #[test]
    fn conflict_status_maps_to_conflict() {
        let err = status_error(StatusCode::CONFLICT, r#"{"error":"Book already exists"}"#.into());
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Duplicate file: Book already exists");
    }

    #[test]
    fn server_error_keeps_body_message() {
        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "Server down".into());
        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Server down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_body_uses_reason_phrase() {
        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, String::new());
        assert_eq!(err.user_message(), "Internal Server Error");
    }
}
