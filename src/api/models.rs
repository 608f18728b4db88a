use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::domain::{OutputFormat, Quality};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Body shared by the metadata and start-download endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub url: String,
    pub format: Quality,
    pub output_format: OutputFormat,
}

impl DownloadRequest {
    /// Request used for the metadata preview, which ignores quality settings.
    pub fn preview(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: Quality::Best,
            output_format: OutputFormat::Original,
        }
    }
}

/// Response from `/api/get-video-info`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnail: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uploader: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formats: Vec<VideoFormat>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub resolution: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ext: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub has_filesize: bool,
}

/// Response from `/api/download/start`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DownloadJob {
    pub job_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Response from `/api/status`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub message: String,
    pub status: String,
}

/// Error payload returned with non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Starting,
    Downloading,
    Processing,
    Completed,
    Error,
    Waiting,
    #[serde(other)]
    Unknown,
}

impl ProgressStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Starting => "starting",
            ProgressStatus::Downloading => "downloading",
            ProgressStatus::Processing => "processing",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Error => "error",
            ProgressStatus::Waiting => "waiting",
            ProgressStatus::Unknown => "unknown",
        }
    }
}

/// One progress snapshot delivered by the `progress` SSE event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProgressData {
    pub status: ProgressStatus,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub downloaded: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total: Option<u64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub eta: Option<u64>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Whole-request limit for plain request/response calls. Streams are
    /// exempt.
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// Builds a config for `base_url`, which must be an http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, String> {
        let mut url = Url::parse(base_url.trim()).map_err(|e| format!("{base_url}: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("{base_url}: expected an http or https URL"));
        }
        // Url::join and path_segments_mut both treat a trailing segment as a file
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            base_url: url,
            ..Self::default()
        })
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            connect_timeout: Duration::from_secs(10),
            // Metadata extraction on the server can take a while
            request_timeout: Duration::from_secs(60),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Byte counts and durations arrive as integers, floats or null depending on
/// what the extractor reported.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(value.and_then(|n| {
        n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u64)
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_download_request_wire_format() {
        let request = DownloadRequest {
            url: "https://youtu.be/abc".to_string(),
            format: Quality::P720,
            output_format: OutputFormat::Webm,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"url": "https://youtu.be/abc", "format": "720p", "output_format": "webm"})
        );

        let preview = serde_json::to_value(DownloadRequest::preview("x")).unwrap();
        assert_eq!(preview["format"], "best");
        assert_eq!(preview["output_format"], "original");
    }

    #[test]
    fn test_video_info_tolerates_nulls_and_floats() {
        let info: VideoInfo = serde_json::from_value(json!({
            "title": "Clip",
            "duration": 65.0,
            "thumbnail": null,
            "uploader": null,
            "formats": [
                {"format_id": "137", "resolution": "1080p", "ext": "mp4", "filesize": 1048576, "has_filesize": true},
                {"format_id": "18", "resolution": "360p", "ext": "mp4", "filesize": 0, "has_filesize": false}
            ]
        }))
        .unwrap();

        assert_eq!(info.duration, Some(65));
        assert_eq!(info.thumbnail, "");
        assert_eq!(info.uploader, "");
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[0].filesize, Some(1_048_576));
    }

    #[test]
    fn test_progress_status_unknown_variant() {
        let data: ProgressData =
            serde_json::from_value(json!({"status": "queued", "total": 2048.7})).unwrap();
        assert_eq!(data.status, ProgressStatus::Unknown);
        assert_eq!(data.total, Some(2049));
        assert!(!data.status.is_terminal());
    }

    #[test]
    fn test_api_config_normalizes_base_url() {
        let config = ApiConfig::new("http://example.com/backend").unwrap();
        assert_eq!(config.base_url.as_str(), "http://example.com/backend/");

        assert!(ApiConfig::new("localhost:8000").is_err());
        assert!(ApiConfig::new("not a url").is_err());
        assert_eq!(ApiConfig::default().base_url.as_str(), "http://localhost:8000/");
    }
}
