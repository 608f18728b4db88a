use iced::{task, widget::image, Task};

use crate::api::ApiClient;
use crate::application::{
    progress_events, DownloadCoordinator, Effect, JobController, Msg, StreamHandle,
    SubscriptionSlot,
};

impl StreamHandle for task::Handle {
    fn close(&self) {
        self.abort();
    }
}

struct Thumbnail {
    url: String,
    handle: Option<image::Handle>,
}

pub struct DownloadApp {
    controller: JobController,
    api_client: ApiClient,
    coordinator: DownloadCoordinator,
    // At most one live progress stream
    progress_stream: SubscriptionSlot<task::Handle>,
    file_save: SubscriptionSlot<task::Handle>,
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Clone)]
pub enum Message {
    Core(Msg),
    ThumbnailLoaded {
        url: String,
        result: Result<image::Handle, String>,
    },
}

impl DownloadApp {
    pub fn new(api_client: ApiClient) -> (Self, Task<Message>) {
        let app = Self {
            controller: JobController::new(),
            coordinator: DownloadCoordinator::new(api_client.clone()),
            api_client,
            progress_stream: SubscriptionSlot::new(),
            file_save: SubscriptionSlot::new(),
            thumbnail: None,
        };

        let client = app.api_client.clone();
        let check = Task::perform(
            async move { client.server_status().await.map_err(|e| e.to_string()) },
            |result| Message::Core(Msg::ServerStatusChecked(result)),
        );

        log::info!("Using backend at {}", app.api_client.base_url());
        (app, check)
    }

    /// Turns controller effects into tasks. Request effects run one after the
    /// other, in the order the controller emitted them.
    fn run_effects(&mut self, effects: Vec<Effect>) -> Task<Message> {
        let mut requests = Task::none();
        let mut streams = Vec::new();

        for effect in effects {
            match effect {
                Effect::CloseProgressStream => {
                    self.progress_stream.close();
                }
                Effect::OpenProgressStream(job_id) => {
                    let events = progress_events(self.api_client.clone(), job_id.clone());
                    let tagged = job_id.clone();
                    let (stream, handle) = Task::run(events, move |event| {
                        Message::Core(Msg::Stream {
                            job_id: tagged.clone(),
                            event,
                        })
                    })
                    .abortable();

                    if let Some(previous) = self.progress_stream.replace(job_id, handle) {
                        log::debug!("Replaced progress stream of job {}", previous);
                    }
                    streams.push(stream);
                }
                Effect::FetchVideoInfo { url } => {
                    let client = self.api_client.clone();
                    requests = requests.chain(Task::perform(
                        async move { client.fetch_video_info(&url).await.map_err(|e| e.to_string()) },
                        |result| Message::Core(Msg::VideoInfoLoaded(result)),
                    ));
                }
                Effect::StartDownload(request) => {
                    let client = self.api_client.clone();
                    requests = requests.chain(Task::perform(
                        async move { client.start_download(&request).await.map_err(|e| e.to_string()) },
                        |result| Message::Core(Msg::DownloadStarted(result)),
                    ));
                }
                Effect::CleanupJob(job_id) => {
                    let client = self.api_client.clone();
                    let finished = job_id.clone();
                    requests = requests.chain(Task::perform(
                        async move { client.cleanup_job(&job_id).await.map_err(|e| e.to_string()) },
                        move |result| {
                            Message::Core(Msg::CleanupFinished {
                                job_id: finished.clone(),
                                result,
                            })
                        },
                    ));
                }
                Effect::ChooseSavePath {
                    job_id,
                    suggested_name,
                } => {
                    let coordinator = self.coordinator.clone();
                    requests = requests.chain(Task::perform(
                        async move { coordinator.choose_save_path(suggested_name).await },
                        move |path| {
                            Message::Core(Msg::SavePathChosen {
                                job_id: job_id.clone(),
                                path,
                            })
                        },
                    ));
                }
                Effect::SaveFile { job_id, path } => {
                    let tagged = job_id.clone();
                    let (transfer, handle) = Task::run(
                        self.coordinator.download_stream(job_id.clone(), path),
                        move |event| {
                            Message::Core(Msg::FileTransfer {
                                job_id: tagged.clone(),
                                event,
                            })
                        },
                    )
                    .abortable();

                    self.file_save.replace(job_id, handle);
                    streams.push(transfer);
                }
                Effect::CancelFileSave => {
                    self.file_save.close();
                }
            }
        }

        streams.push(requests);
        Task::batch(streams)
    }

    /// Keeps the thumbnail in step with the loaded video info.
    fn sync_thumbnail(&mut self) -> Task<Message> {
        let wanted = self
            .controller
            .video_info()
            .map(|info| info.thumbnail.clone())
            .filter(|url| !url.is_empty());

        if wanted.as_deref() == self.thumbnail.as_ref().map(|t| t.url.as_str()) {
            return Task::none();
        }

        let Some(url) = wanted else {
            self.thumbnail = None;
            return Task::none();
        };

        self.thumbnail = Some(Thumbnail {
            url: url.clone(),
            handle: None,
        });

        let client = self.api_client.clone();
        let requested = url.clone();
        Task::perform(load_thumbnail(client, url), move |result| {
            Message::ThumbnailLoaded {
                url: requested.clone(),
                result,
            }
        })
    }
}

async fn load_thumbnail(client: ApiClient, url: String) -> Result<image::Handle, String> {
    let bytes = client
        .fetch_thumbnail(&url)
        .await
        .map_err(|e| e.to_string())?;

    let rgba = ::image::load_from_memory(&bytes)
        .map_err(|e| e.to_string())?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(image::Handle::from_rgba(width, height, rgba.into_raw()))
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::Core(msg) => {
            let effects = app.controller.update(msg);
            let effects = app.run_effects(effects);
            let thumbnail = app.sync_thumbnail();
            Task::batch([effects, thumbnail])
        }
        Message::ThumbnailLoaded { url, result } => {
            match (&mut app.thumbnail, result) {
                (Some(thumbnail), Ok(handle)) if thumbnail.url == url => {
                    thumbnail.handle = Some(handle);
                }
                (_, Ok(_)) => log::debug!("Dropping outdated thumbnail {}", url),
                (_, Err(e)) => log::warn!("Could not load thumbnail {}: {}", url, e),
            }
            Task::none()
        }
    }
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    let thumbnail = app.thumbnail.as_ref().and_then(|t| t.handle.as_ref());
    crate::ui::view(&app.controller, thumbnail).map(Message::Core)
}
