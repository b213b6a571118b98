use api::recording::Recording;
use api::response::ErrorBody;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use tracing::{debug, info};

use crate::error::ApiError;

pub const API_URL_ENV: &str = "SCREENREC_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

/// HTTP client for the recordings API
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// `explicit`, else `$SCREENREC_API_URL`, else `http://localhost:3001`
    pub fn from_env(explicit: Option<String>) -> Self {
        let base_url = explicit
            .or_else(|| std::env::var(API_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute form of a server path such as a recording's derived URL
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        mime_type: &str,
    ) -> Result<Recording, ApiError> {
        let len = data.len() as u64;
        let part = Part::stream_with_length(data, len)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;
        let form = Form::new().part(api::path::UPLOAD_FIELD, part);

        debug!("Uploading {} ({} bytes)", filename, len);
        let response = self
            .http
            .post(self.url(api::path::RECORDINGS))
            .multipart(form)
            .send()
            .await?;
        let recording: Recording = check(response).await?.json().await?;
        info!("Uploaded recording {} as {}", recording.id, recording.filename);
        Ok(recording)
    }

    pub async fn list(&self) -> Result<Vec<Recording>, ApiError> {
        let response = self.http.get(self.url(api::path::RECORDINGS)).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Recording, ApiError> {
        let response = self
            .http
            .get(self.url(&api::path::recording(id)))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Raw bytes behind a recording's derived URL
    pub async fn fetch_blob(&self, recording: &Recording) -> Result<Bytes, ApiError> {
        let response = self.http.get(self.url(&recording.url)).send().await?;
        Ok(check(response).await?.bytes().await?)
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(match status {
        StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
        StatusCode::NOT_FOUND => ApiError::NotFound,
        _ => ApiError::Server {
            status: status.as_u16(),
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://example.com:3001/");
        assert_eq!(client.base_url(), "http://example.com:3001");
        assert_eq!(
            client.url("/uploads/1-a.webm"),
            "http://example.com:3001/uploads/1-a.webm"
        );
    }

    #[test]
    fn test_explicit_url_wins() {
        let client = ApiClient::from_env(Some("http://10.0.0.1:8080".to_string()));
        assert_eq!(client.base_url(), "http://10.0.0.1:8080");
    }
}
