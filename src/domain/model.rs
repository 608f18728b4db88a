use std::fmt;

use serde::Serialize;

/// Server-assigned job identifier
pub type JobId = String;

/// Requested video quality. `Audio` extracts an MP3 instead of video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "audio")]
    Audio,
}

impl Quality {
    pub const RESOLUTIONS: [Quality; 6] = [
        Quality::P2160,
        Quality::P1440,
        Quality::P1080,
        Quality::P720,
        Quality::P480,
        Quality::P360,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P2160 => "2160p",
            Quality::P1440 => "1440p",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::Audio => "audio",
        }
    }

    /// Maps a resolution label reported by the server, e.g. `"720p"`.
    pub fn from_resolution(label: &str) -> Option<Self> {
        Self::RESOLUTIONS
            .into_iter()
            .find(|quality| quality.as_str() == label)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => f.write_str("Best Quality"),
            Quality::Audio => f.write_str("Audio Only (MP3)"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Container requested for video output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Original,
    Mp4,
    Webm,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [
        OutputFormat::Original,
        OutputFormat::Mp4,
        OutputFormat::Webm,
    ];
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Original => "Original",
            OutputFormat::Mp4 => "MP4",
            OutputFormat::Webm => "WebM",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    FetchingMetadata,
    MetadataReady,
    StartingDownload,
    Downloading,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_from_resolution() {
        assert_eq!(Quality::from_resolution("1080p"), Some(Quality::P1080));
        assert_eq!(Quality::from_resolution("240p"), None);
        assert_eq!(Quality::from_resolution("best"), None);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(Quality::Audio.to_string(), "Audio Only (MP3)");
        assert_eq!(Quality::P720.to_string(), "720p");
        assert_eq!(OutputFormat::Webm.to_string(), "WebM");
    }
}
