use async_trait::async_trait;
use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::indexer::{FaceIndexer, HttpIndexerConfig, IndexerError};

const REGISTER_PATH: &str = "add_to_db/";
const COMPARE_PATH: &str = "compare/";
const PROBE_FILENAME: &str = "probe.jpg";

/// Client for the face match service.
///
/// Both calls post a multipart body with a single `file` part and pass the
/// album as the `album_id` query parameter. Failures come back as FastAPI
/// style `{ "detail": ... }` bodies.
pub struct HttpIndexer {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

#[derive(Deserialize)]
struct CompareResponse {
    matches: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: serde_json::Value,
}

impl HttpIndexer {
    pub fn new(
        config: &HttpIndexerConfig,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, IndexerError> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            IndexerError::ConfigError(format!("invalid base_url {:?}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(IndexerError::ConfigError(format!(
                "base_url {:?} cannot be used as a base",
                config.base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("flashback/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IndexerError::ConfigError(format!("client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn endpoint(&self, path: &str, album_id: &str) -> Result<Url, IndexerError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| IndexerError::ConfigError(e.to_string()))?;
        url.query_pairs_mut().append_pair("album_id", album_id);
        Ok(url)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> IndexerError {
        if err.is_timeout() {
            IndexerError::Timeout(self.timeout)
        } else {
            IndexerError::RequestError(err.to_string())
        }
    }

    async fn post_image(
        &self,
        url: Url,
        filename: &str,
        image: Vec<u8>,
    ) -> Result<reqwest::Response, IndexerError> {
        let content_type = mime_guess::from_path(filename).first_or_octet_stream();
        let part = Part::bytes(image)
            .file_name(filename.to_string())
            .mime_str(content_type.as_ref())
            .map_err(|e| IndexerError::RequestError(e.to_string()))?;
        let form = Form::new().part("file", part);

        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let detail = extract_detail(status, &body);
        warn!(status = %status, detail = %detail, "Face service returned an error");

        Err(IndexerError::ServiceError {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl FaceIndexer for HttpIndexer {
    async fn register(
        &self,
        album_id: &str,
        filename: &str,
        image: Vec<u8>,
    ) -> Result<(), IndexerError> {
        let url = self.endpoint(REGISTER_PATH, album_id)?;
        self.post_image(url, filename, image).await?;
        Ok(())
    }

    async fn compare(&self, album_id: &str, probe: Vec<u8>) -> Result<Vec<String>, IndexerError> {
        let url = self.endpoint(COMPARE_PATH, album_id)?;
        let response = self.post_image(url, PROBE_FILENAME, probe).await?;

        let body = response.bytes().await.map_err(|e| self.map_transport_error(e))?;
        let parsed: CompareResponse = serde_json::from_slice(&body)
            .map_err(|e| IndexerError::InvalidResponse(e.to_string()))?;

        Ok(parsed.matches)
    }

    fn name(&self) -> &str {
        "HTTP face service"
    }
}

fn extract_detail(status: StatusCode, body: &str) -> String {
    if let Ok(error) = serde_json::from_str::<ErrorResponse>(body) {
        return match error.detail {
            serde_json::Value::String(detail) => detail,
            other => other.to_string(),
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("status {}", status.as_u16()))
    } else {
        trimmed.to_string()
    }
}
