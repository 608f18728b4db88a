pub mod client;
pub mod decode;
pub mod models;
pub mod sse;

pub use client::{ApiClient, ByteStream};
pub use models::{
    ApiConfig, DownloadJob, DownloadRequest, ProgressData, ProgressStatus, ServerStatus, VideoInfo,
};
