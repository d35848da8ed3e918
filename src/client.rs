//! HTTP client for a running flashback server, used by the command line
//! tools.

use crate::{
    albums::Thumbnail, ingest::ReindexReport, matching::MatchResponse, session::SESSION_COOKIE,
    storage::PhotoListing,
};
use reqwest::{
    StatusCode,
    header::COOKIE,
    multipart::{Form, Part},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlbumInfo {
    pub title: String,
    pub thumbnail: Option<Thumbnail>,
    pub id: String,
}

/// One entry of an upload response, either stored or failed.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResult {
    pub file: Option<String>,
    pub url: Option<String>,
    pub filename: Option<String>,
    #[serde(default)]
    pub indexed: bool,
    pub index_error: Option<String>,
    pub error: Option<String>,
    pub details: Option<String>,
}

impl UploadResult {
    pub fn is_stored(&self) -> bool {
        self.url.is_some()
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    uploads: Vec<UploadResult>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    details: Option<String>,
    detail: Option<String>,
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    session: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("flashback-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            session: None,
        })
    }

    /// Sends `value` as the owner session cookie on every request.
    pub fn with_session(mut self, value: impl Into<String>) -> Self {
        self.session = Some(value.into());
        self
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.session {
            Some(session) => builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, session)),
            None => builder,
        }
    }

    pub async fn get_album(&self, slug: &str) -> Result<AlbumInfo, ClientError> {
        let mut url = self.url("api/get-album")?;
        url.query_pairs_mut().append_pair("id", slug);

        let response = self.request(reqwest::Method::GET, url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn list_photos(&self, album_id: &str) -> Result<PhotoListing, ClientError> {
        let url = self.url(&format!("photos/{}", album_id))?;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Uploads a batch of files in one request and returns the per-file
    /// outcomes in the order of `files`.
    pub async fn upload_batch(
        &self,
        album_id: &str,
        files: &[PathBuf],
    ) -> Result<Vec<UploadResult>, ClientError> {
        let mut form = Form::new().text("album_id", album_id.to_string());
        for path in files {
            form = form.part("file", file_part(path).await?);
        }

        let url = self.url("api/upload")?;
        let response = self
            .request(reqwest::Method::POST, url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<UploadResponse>(&body) {
            Ok(parsed) => Ok(parsed.uploads),
            Err(_) => Err(api_error(status, &body)),
        }
    }

    pub async fn compare(&self, album_id: &str, probe: &Path) -> Result<Vec<String>, ClientError> {
        let mut url = self.url("compare/")?;
        url.query_pairs_mut().append_pair("album_id", album_id);

        let form = Form::new().part("file", file_part(probe).await?);
        let response = self
            .request(reqwest::Method::POST, url)
            .multipart(form)
            .send()
            .await?;

        let parsed: MatchResponse = check(response).await?.json().await?;
        Ok(parsed.matches)
    }

    pub async fn reindex(&self, album_id: &str) -> Result<ReindexReport, ClientError> {
        let url = self.url(&format!("api/albums/{}/reindex", album_id))?;
        let response = self.request(reqwest::Method::POST, url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Saves a photo into `dest_dir` under its stored name.
    pub async fn download(
        &self,
        album_id: &str,
        filename: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, ClientError> {
        let url = self.url(&format!("download/{}/{}", album_id, filename))?;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let bytes = check(response).await?.bytes().await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let target = dest_dir.join(filename);
        tokio::fs::write(&target, &bytes).await?;
        info!("Downloaded {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }
}

async fn file_part(path: &Path) -> Result<Part, ClientError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.jpg".to_string());
    let content_type = mime_guess::from_path(path).first_or_octet_stream();

    Ok(Part::bytes(bytes)
        .file_name(name)
        .mime_str(content_type.as_ref())?)
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

fn api_error(status: StatusCode, body: &str) -> ClientError {
    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            detail: Some(detail),
            ..
        }) => detail,
        Ok(ErrorResponse {
            error: Some(error),
            details: Some(details),
            ..
        }) => format!("{} ({})", error, details),
        Ok(ErrorResponse {
            error: Some(error), ..
        }) => error,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };

    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_messages() {
        let err = api_error(StatusCode::NOT_FOUND, r#"{"error": "Album not found"}"#);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Server returned 404: Album not found");

        let err = api_error(
            StatusCode::BAD_GATEWAY,
            r#"{"error": "Face server failed", "details": "upstream down"}"#,
        );
        assert!(err.to_string().contains("Face server failed (upstream down)"));

        let err = api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": "No face detected in selfie."}"#,
        );
        assert!(err.to_string().ends_with("No face detected in selfie."));

        let err = api_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.to_string().ends_with("Service Unavailable"));
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let client = ApiClient::new("http://localhost:3000/flashback").unwrap();
        assert_eq!(
            client.url("api/get-album").unwrap().as_str(),
            "http://localhost:3000/flashback/api/get-album"
        );
    }
}
