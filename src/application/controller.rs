use std::path::PathBuf;

use crate::{
    api::{DownloadJob, DownloadRequest, ProgressData, ProgressStatus, ServerStatus, VideoInfo},
    application::{download_coordinator::DownloadEvent, progress_stream::StreamEvent},
    domain::{AppError, DownloadPhase, JobId, OutputFormat, Quality},
    utils::suggested_file_name,
};

const CONNECTION_ERROR: &str = "Connection error";
const DOWNLOAD_FAILED: &str = "Download failed";

/// Inputs to the controller: user intents and results of effects.
#[derive(Debug, Clone)]
pub enum Msg {
    UrlChanged(String),
    QualitySelected(Quality),
    OutputFormatSelected(OutputFormat),
    FetchInfoPressed,
    VideoInfoLoaded(Result<VideoInfo, String>),
    StartDownloadPressed,
    DownloadStarted(Result<DownloadJob, String>),
    Stream { job_id: JobId, event: StreamEvent },
    DownloadFilePressed,
    SavePathChosen { job_id: JobId, path: Option<PathBuf> },
    FileTransfer { job_id: JobId, event: DownloadEvent },
    /// "Start New Download" after a finished job
    NewDownloadPressed,
    RetryPressed,
    CleanupFinished { job_id: JobId, result: Result<(), String> },
    ServerStatusChecked(Result<ServerStatus, String>),
}

/// Work the controller asks the runtime to perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchVideoInfo { url: String },
    StartDownload(DownloadRequest),
    CleanupJob(JobId),
    OpenProgressStream(JobId),
    CloseProgressStream,
    ChooseSavePath { job_id: JobId, suggested_name: String },
    SaveFile { job_id: JobId, path: PathBuf },
    CancelFileSave,
}

/// Local copy of a finished job's file
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FileSave {
    #[default]
    Idle,
    ChoosingPath,
    /// Fraction written, 0.0 to 1.0
    Saving(f32),
    Saved(PathBuf),
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    VideoInfo,
    StartDownload,
}

/// Client-side job lifecycle.
///
/// Invariant: `progress` is only ever set while `job_id` is.
#[derive(Debug, Default)]
pub struct JobController {
    url: String,
    video_info: Option<VideoInfo>,
    quality: Quality,
    output_format: OutputFormat,
    job_id: Option<JobId>,
    progress: Option<ProgressData>,
    error: Option<String>,
    loading: bool,
    pending: Option<Pending>,
    streaming: bool,
    file_save: FileSave,
    server: Option<Result<ServerStatus, String>>,
}

impl JobController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn video_info(&self) -> Option<&VideoInfo> {
        self.video_info.as_ref()
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Output format only applies to video downloads.
    pub fn output_format_enabled(&self) -> bool {
        self.quality != Quality::Audio
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn progress(&self) -> Option<&ProgressData> {
        self.progress.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn file_save(&self) -> &FileSave {
        &self.file_save
    }

    pub fn server_status(&self) -> Option<&Result<ServerStatus, String>> {
        self.server.as_ref()
    }

    pub fn phase(&self) -> DownloadPhase {
        if self.error.is_some() {
            return DownloadPhase::Failed;
        }
        match self.pending {
            Some(Pending::VideoInfo) => return DownloadPhase::FetchingMetadata,
            Some(Pending::StartDownload) => return DownloadPhase::StartingDownload,
            None => {}
        }
        match (&self.job_id, &self.progress) {
            (Some(_), Some(progress)) if progress.status == ProgressStatus::Completed => {
                DownloadPhase::Completed
            }
            (Some(_), _) if self.loading || self.streaming => DownloadPhase::Downloading,
            _ if self.video_info.is_some() => DownloadPhase::MetadataReady,
            _ => DownloadPhase::Idle,
        }
    }

    /// Qualities worth offering for the current video: `best`, every known
    /// resolution the server has a size for, and `audio`.
    pub fn quality_options(&self) -> Vec<Quality> {
        let mut options = vec![Quality::Best];
        if let Some(info) = &self.video_info {
            options.extend(Quality::RESOLUTIONS.into_iter().filter(|quality| {
                info.formats.iter().any(|format| {
                    format.has_filesize && Quality::from_resolution(&format.resolution) == Some(*quality)
                })
            }));
        }
        options.push(Quality::Audio);
        options
    }

    pub fn update(&mut self, msg: Msg) -> Vec<Effect> {
        match msg {
            Msg::UrlChanged(url) => {
                self.url = url;
                Vec::new()
            }
            Msg::QualitySelected(quality) => {
                self.quality = quality;
                Vec::new()
            }
            Msg::OutputFormatSelected(format) => {
                self.output_format = format;
                Vec::new()
            }
            Msg::FetchInfoPressed => self.request_metadata(),
            Msg::VideoInfoLoaded(result) => {
                self.video_info_loaded(result);
                Vec::new()
            }
            Msg::StartDownloadPressed => self.start_download(),
            Msg::DownloadStarted(result) => self.download_started(result),
            Msg::Stream { job_id, event } => self.stream_event(job_id, event),
            Msg::DownloadFilePressed => self.download_file(),
            Msg::SavePathChosen { job_id, path } => self.save_path_chosen(job_id, path),
            Msg::FileTransfer { job_id, event } => {
                self.file_transfer(job_id, event);
                Vec::new()
            }
            Msg::NewDownloadPressed => self.cleanup(false),
            Msg::RetryPressed => self.reset(),
            Msg::CleanupFinished { job_id, result } => {
                match result {
                    Ok(()) => log::debug!("Job {} cleaned up on server", job_id),
                    Err(e) => log::warn!("Cleanup of job {} failed: {}", job_id, e),
                }
                Vec::new()
            }
            Msg::ServerStatusChecked(result) => {
                match &result {
                    Ok(status) => log::info!("Backend status: {} ({})", status.status, status.message),
                    Err(e) => log::warn!("Backend unreachable: {}", e),
                }
                self.server = Some(result);
                Vec::new()
            }
        }
    }

    fn validated_url(&mut self) -> Option<String> {
        let url = self.url.trim();
        if url.is_empty() {
            self.error = Some(AppError::InvalidInput.to_string());
            return None;
        }
        Some(url.to_string())
    }

    fn request_metadata(&mut self) -> Vec<Effect> {
        if self.loading {
            log::debug!("Metadata request ignored while busy");
            return Vec::new();
        }
        let Some(url) = self.validated_url() else {
            return Vec::new();
        };

        let mut effects = self.cleanup(true);
        self.loading = true;
        self.pending = Some(Pending::VideoInfo);
        self.error = None;
        self.video_info = None;

        log::info!("Fetching video info for {}", url);
        effects.push(Effect::FetchVideoInfo { url });
        effects
    }

    fn video_info_loaded(&mut self, result: Result<VideoInfo, String>) {
        if self.pending != Some(Pending::VideoInfo) {
            log::debug!("Discarding video info that nobody is waiting for");
            return;
        }
        self.pending = None;
        self.loading = false;

        match result {
            Ok(info) => {
                log::info!("Loaded '{}' with {} formats", info.title, info.formats.len());
                self.video_info = Some(info);
            }
            Err(e) => {
                log::warn!("Video info request failed: {}", e);
                self.error = Some(e);
            }
        }
    }

    fn start_download(&mut self) -> Vec<Effect> {
        if self.loading {
            log::debug!("Download request ignored while busy");
            return Vec::new();
        }
        let Some(url) = self.validated_url() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if self.streaming {
            self.streaming = false;
            effects.push(Effect::CloseProgressStream);
        }

        self.loading = true;
        self.pending = Some(Pending::StartDownload);
        self.error = None;
        self.progress = None;
        self.abandon_file_save(&mut effects);

        let request = DownloadRequest {
            url,
            format: self.quality,
            output_format: self.output_format,
        };
        log::info!(
            "Starting download of {} ({} / {})",
            request.url,
            request.format.as_str(),
            self.output_format
        );
        effects.push(Effect::StartDownload(request));
        effects
    }

    fn download_started(&mut self, result: Result<DownloadJob, String>) -> Vec<Effect> {
        if self.pending != Some(Pending::StartDownload) {
            log::debug!("Discarding start-download response that nobody is waiting for");
            return Vec::new();
        }
        self.pending = None;

        match result {
            Ok(job) => {
                log::info!("Job {} accepted: {} {}", job.job_id, job.status, job.message);
                let mut effects = Vec::new();
                if let Some(previous) = self.job_id.replace(job.job_id.clone()) {
                    if previous != job.job_id {
                        effects.push(Effect::CleanupJob(previous));
                    }
                }
                self.streaming = true;
                effects.push(Effect::OpenProgressStream(job.job_id));
                effects
            }
            Err(e) => {
                log::warn!("Start download failed: {}", e);
                self.loading = false;
                self.error = Some(e);
                Vec::new()
            }
        }
    }

    fn stream_event(&mut self, job_id: JobId, event: StreamEvent) -> Vec<Effect> {
        if !self.streaming || self.job_id.as_deref() != Some(job_id.as_str()) {
            log::debug!("Ignoring stale stream event for job {}", job_id);
            return Vec::new();
        }

        match event {
            StreamEvent::Progress(progress) => {
                let mut effects = Vec::new();
                match progress.status {
                    ProgressStatus::Completed => {
                        log::info!("Job {} completed", job_id);
                        self.finish_stream(&mut effects);
                    }
                    ProgressStatus::Error => {
                        let message = progress
                            .message
                            .clone()
                            .filter(|m| !m.is_empty())
                            .unwrap_or_else(|| DOWNLOAD_FAILED.to_string());
                        log::warn!("Job {} failed: {}", job_id, message);
                        self.error = Some(message);
                        self.finish_stream(&mut effects);
                    }
                    _ => {}
                }
                self.progress = Some(progress);
                effects
            }
            StreamEvent::Closed => {
                log::debug!("Server closed progress stream for job {}", job_id);
                self.streaming = false;
                vec![Effect::CloseProgressStream]
            }
            StreamEvent::Failed(reason) => {
                log::error!("Progress stream for job {} failed: {}", job_id, reason);
                self.error = Some(CONNECTION_ERROR.to_string());
                let mut effects = Vec::new();
                self.finish_stream(&mut effects);
                effects
            }
        }
    }

    fn finish_stream(&mut self, effects: &mut Vec<Effect>) {
        self.loading = false;
        self.streaming = false;
        effects.push(Effect::CloseProgressStream);
    }

    fn download_file(&mut self) -> Vec<Effect> {
        let Some(job_id) = self.job_id.clone() else {
            return Vec::new();
        };
        if matches!(self.file_save, FileSave::ChoosingPath | FileSave::Saving(_)) {
            return Vec::new();
        }

        let suggested_name = suggested_file_name(
            &job_id,
            self.progress.as_ref().and_then(|p| p.filename.as_deref()),
        );
        self.file_save = FileSave::ChoosingPath;
        vec![Effect::ChooseSavePath {
            job_id,
            suggested_name,
        }]
    }

    fn save_path_chosen(&mut self, job_id: JobId, path: Option<PathBuf>) -> Vec<Effect> {
        if self.file_save != FileSave::ChoosingPath || self.job_id.as_deref() != Some(job_id.as_str()) {
            return Vec::new();
        }

        match path {
            Some(path) => {
                log::info!("Saving job {} to {}", job_id, path.display());
                self.file_save = FileSave::Saving(0.0);
                vec![Effect::SaveFile { job_id, path }]
            }
            None => {
                self.file_save = FileSave::Cancelled;
                Vec::new()
            }
        }
    }

    fn file_transfer(&mut self, job_id: JobId, event: DownloadEvent) {
        if !matches!(self.file_save, FileSave::Saving(_))
            || self.job_id.as_deref() != Some(job_id.as_str())
        {
            log::debug!("Ignoring stale file transfer event for job {}", job_id);
            return;
        }

        self.file_save = match event {
            DownloadEvent::Progress(fraction) => FileSave::Saving(fraction),
            DownloadEvent::Completed(path) => {
                log::info!("Saved {}", path.display());
                FileSave::Saved(path)
            }
            DownloadEvent::Failed(e) => {
                log::warn!("Saving file failed: {}", e);
                FileSave::Failed(e.to_string())
            }
        };
    }

    /// Forgets the local save state, aborting a transfer that is still running.
    fn abandon_file_save(&mut self, effects: &mut Vec<Effect>) {
        if matches!(self.file_save, FileSave::Saving(_)) {
            effects.push(Effect::CancelFileSave);
        }
        self.file_save = FileSave::Idle;
    }

    /// Drops the active job locally and asks the server to release it.
    /// Without an active job this does nothing at all.
    fn cleanup(&mut self, keep_url: bool) -> Vec<Effect> {
        let Some(job_id) = self.job_id.take() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if self.streaming {
            self.finish_stream(&mut effects);
        }
        self.abandon_file_save(&mut effects);
        log::info!("Cleaning up job {}", job_id);
        effects.push(Effect::CleanupJob(job_id));

        self.progress = None;
        self.video_info = None;
        if !keep_url {
            self.url.clear();
        }
        effects
    }

    fn reset(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.streaming {
            effects.push(Effect::CloseProgressStream);
        }
        self.abandon_file_save(&mut effects);
        if let Some(job_id) = self.job_id.take() {
            effects.push(Effect::CleanupJob(job_id));
        }

        let server = self.server.take();
        *self = Self {
            server,
            ..Self::default()
        };
        effects
    }
}
