use std::path::PathBuf;

use futures::{stream::BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::{
    api::{ApiClient, ByteStream},
    domain::{AppError, JobId},
};

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Progress(f32),
    Completed(PathBuf),
    Failed(AppError),
}

/// Copies a finished job's file from the server to local disk.
#[derive(Clone)]
pub struct DownloadCoordinator {
    api_client: ApiClient,
}

impl DownloadCoordinator {
    pub fn new(api_client: ApiClient) -> Self {
        Self { api_client }
    }

    pub async fn choose_save_path(&self, suggested_filename: String) -> Option<PathBuf> {
        rfd::AsyncFileDialog::new()
            .set_file_name(&suggested_filename)
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    /// Streams the job's file into `path`. A partially written file is
    /// removed when the transfer fails.
    pub fn download_stream(&self, job_id: JobId, path: PathBuf) -> BoxStream<'static, DownloadEvent> {
        futures::stream::unfold(
            DownloadRuntimeState::Start {
                client: self.api_client.clone(),
                job_id,
                path,
            },
            |state| async move {
                match state {
                    DownloadRuntimeState::Start { client, job_id, path } => {
                        let (total_size, stream) = match client.download_file_stream(&job_id).await {
                            Ok(response) => response,
                            Err(e) => {
                                return Some((
                                    DownloadEvent::Failed(AppError::Api(e.to_string())),
                                    DownloadRuntimeState::Finished,
                                ));
                            }
                        };

                        let file = match tokio::fs::File::create(&path).await {
                            Ok(file) => file,
                            Err(e) => {
                                return Some((
                                    DownloadEvent::Failed(AppError::Io(format!(
                                        "Failed to create file: {}",
                                        e
                                    ))),
                                    DownloadRuntimeState::Finished,
                                ));
                            }
                        };

                        Some((
                            DownloadEvent::Progress(0.0),
                            DownloadRuntimeState::Downloading {
                                file,
                                stream,
                                downloaded: 0,
                                total: total_size,
                                path,
                            },
                        ))
                    }
                    DownloadRuntimeState::Downloading {
                        mut file,
                        mut stream,
                        mut downloaded,
                        total,
                        path,
                    } => match stream.next().await {
                        Some(Ok(chunk)) => {
                            let written = file.write_all(&chunk).await;
                            if let Err(e) = written {
                                drop(file);
                                return Some(fail(path, AppError::Io(format!("Write error: {}", e))).await);
                            }

                            downloaded += chunk.len() as u64;

                            let progress = match total {
                                Some(total_size) if total_size > 0 => {
                                    (downloaded as f32 / total_size as f32).min(1.0)
                                }
                                _ => 0.0,
                            };

                            Some((
                                DownloadEvent::Progress(progress),
                                DownloadRuntimeState::Downloading {
                                    file,
                                    stream,
                                    downloaded,
                                    total,
                                    path,
                                },
                            ))
                        }
                        Some(Err(e)) => {
                            drop(file);
                            Some(fail(path, AppError::Api(e.to_string())).await)
                        }
                        None => {
                            if let Err(e) = file.sync_all().await {
                                return Some(
                                    fail(path, AppError::Io(format!("Failed to sync file: {}", e))).await,
                                );
                            }

                            Some((
                                DownloadEvent::Completed(path),
                                DownloadRuntimeState::Finished,
                            ))
                        }
                    },
                    DownloadRuntimeState::Finished => None,
                }
            },
        )
        .boxed()
    }
}

async fn fail(path: PathBuf, error: AppError) -> (DownloadEvent, DownloadRuntimeState) {
    if let Err(e) = tokio::fs::remove_file(&path).await {
        log::warn!("Could not remove partial file {}: {}", path.display(), e);
    }
    (DownloadEvent::Failed(error), DownloadRuntimeState::Finished)
}

enum DownloadRuntimeState {
    Start {
        client: ApiClient,
        job_id: JobId,
        path: PathBuf,
    },
    Downloading {
        file: tokio::fs::File,
        stream: ByteStream,
        downloaded: u64,
        total: Option<u64>,
        path: PathBuf,
    },
    Finished,
}
