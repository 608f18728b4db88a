use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use url::Url;

use super::models::{
    ApiConfig, DownloadJob, DownloadRequest, ErrorResponse, ServerStatus, VideoInfo,
};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response; `detail` is shown to the user as-is.
    #[error("{detail}")]
    Server { status: StatusCode, detail: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

pub type ByteStream = BoxStream<'static, Result<bytes::Bytes>>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        // Per-request timeouts only: progress streams stay open until the job ends
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { config, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.config.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Public URL of a finished job's file.
    pub fn file_url(&self, job_id: &str) -> Result<Url> {
        self.endpoint(&["api", "download", "file", job_id])
    }

    /// Turns a non-2xx response into `ApiError::Server`, preferring the
    /// server's `detail` message over `fallback`.
    async fn check_status(response: Response, fallback: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|body| body.detail)
            .filter(|detail| !detail.is_empty())
            .unwrap_or_else(|| fallback.to_string());

        Err(ApiError::Server { status, detail })
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    pub async fn server_status(&self) -> Result<ServerStatus> {
        let response = self
            .http
            .get(self.endpoint(&["api", "status"])?)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let response = Self::check_status(response, "Server status unavailable").await?;
        Self::decode(response).await
    }

    /// Fetches title, duration and available formats without starting a job
    pub async fn fetch_video_info(&self, url: &str) -> Result<VideoInfo> {
        let response = self
            .http
            .post(self.endpoint(&["api", "get-video-info"])?)
            .timeout(self.config.request_timeout)
            .json(&DownloadRequest::preview(url))
            .send()
            .await?;

        let response = Self::check_status(response, "Failed to fetch video info").await?;
        Self::decode(response).await
    }

    pub async fn start_download(&self, request: &DownloadRequest) -> Result<DownloadJob> {
        let response = self
            .http
            .post(self.endpoint(&["api", "download", "start"])?)
            .timeout(self.config.request_timeout)
            .json(request)
            .send()
            .await?;

        let response = Self::check_status(response, "Failed to start download").await?;
        Self::decode(response).await
    }

    /// Releases the job's server-side file. The response body carries nothing
    /// we use.
    pub async fn cleanup_job(&self, job_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint(&["api", "download", job_id])?)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        Self::check_status(response, "Cleanup failed").await?;
        Ok(())
    }

    /// Opens the job's server-sent event stream and returns the raw body.
    pub async fn progress_stream(&self, job_id: &str) -> Result<ByteStream> {
        let response = self
            .http
            .get(self.endpoint(&["api", "download", "progress", job_id])?)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let response = Self::check_status(response, "Progress stream unavailable").await?;
        Ok(response.bytes_stream().map_err(ApiError::Request).boxed())
    }

    /// Downloads a finished job's file with progress stream
    /// Returns (total_size, stream)
    pub async fn download_file_stream(&self, job_id: &str) -> Result<(Option<u64>, ByteStream)> {
        let response = self.http.get(self.file_url(job_id)?).send().await?;
        let response = Self::check_status(response, "File not available").await?;

        let total_size = response.content_length();
        let stream = response
            .bytes_stream()
            .map_err(ApiError::Request)
            .boxed();

        Ok((total_size, stream))
    }

    pub async fn fetch_thumbnail(&self, url: &str) -> Result<bytes::Bytes> {
        let response = self
            .http
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let response = Self::check_status(response, "Thumbnail unavailable").await?;
        Ok(response.bytes().await?)
    }
}
