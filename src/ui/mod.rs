use iced::{
    widget::{
        button, column, image, pick_list, progress_bar, row, text, text_input, Column, Space,
    },
    Element, Length,
};

use crate::{
    api::{ProgressData, ProgressStatus, VideoInfo},
    application::{FileSave, JobController, Msg},
    domain::{DownloadPhase, OutputFormat},
    utils::{format_bytes, format_duration},
};

/// Renders the controller state. Every interaction is emitted as a `Msg`.
pub fn view<'a>(controller: &'a JobController, thumbnail: Option<&'a image::Handle>) -> Element<'a, Msg> {
    let phase = controller.phase();
    let can_fetch = !controller.url().trim().is_empty()
        && !controller.is_loading()
        && controller.error().is_none();

    let mut content = column![
        text("MeTube - a simple video downloader").size(32),
        Space::new().height(Length::Fixed(10.0)),
        row![
            text_input("Enter or paste link here...", controller.url())
                .on_input(Msg::UrlChanged)
                .on_submit(Msg::FetchInfoPressed)
                .padding(10),
            button("Start")
                .on_press_maybe(can_fetch.then_some(Msg::FetchInfoPressed))
                .padding([10, 20]),
        ]
        .spacing(10),
    ]
    .padding(20)
    .spacing(10);

    if let Some(line) = server_line(controller) {
        content = content.push(text(line).size(12));
    }

    if phase == DownloadPhase::FetchingMetadata {
        content = content.push(text("Fetching video info...").size(14));
    }

    if let Some(error) = controller.error() {
        content = content.push(
            column![
                text(format!("Error: {}", error)).size(16),
                text("Please check the URL and try again.").size(14),
                button("Retry").on_press(Msg::RetryPressed).padding([10, 20]),
            ]
            .spacing(8),
        );
    }

    if let Some(info) = controller.video_info() {
        content = content.push(video_section(controller, info, thumbnail));
    }

    if let Some(progress) = controller.progress() {
        content = content.push(progress_section(controller, progress));
    }

    content.into()
}

fn server_line(controller: &JobController) -> Option<String> {
    match controller.server_status()? {
        Ok(status) if status.status == "running" => None,
        Ok(status) => Some(format!("Backend reports status '{}'", status.status)),
        Err(e) => Some(format!("Backend unreachable: {}", e)),
    }
}

fn video_section<'a>(
    controller: &'a JobController,
    info: &'a VideoInfo,
    thumbnail: Option<&'a image::Handle>,
) -> Element<'a, Msg> {
    let mut section = Column::new().spacing(10);

    if let Some(handle) = thumbnail {
        section = section.push(image(handle.clone()).width(Length::Fixed(320.0)));
    }

    section = section
        .push(text(&info.title).size(24))
        .push(
            row![
                text(format!("Uploader: {}", info.uploader)).size(16),
                Space::new().width(Length::Fill),
                text(format!("Duration: {}", format_duration(info.duration))).size(16),
            ]
            .width(Length::Fixed(480.0)),
        )
        .push(
            row![
                text("Quality:").size(16),
                pick_list(
                    controller.quality_options(),
                    Some(controller.quality()),
                    Msg::QualitySelected,
                ),
            ]
            .spacing(10),
        );

    let format_picker: Element<'a, Msg> = if controller.output_format_enabled() {
        pick_list(
            &OutputFormat::ALL[..],
            Some(controller.output_format()),
            Msg::OutputFormatSelected,
        )
        .into()
    } else {
        text("n/a for audio").size(14).into()
    };
    section = section.push(row![text("Format:").size(16), format_picker].spacing(10));

    let label = if controller.is_loading() {
        "Processing..."
    } else {
        "Start Download"
    };
    section = section.push(
        button(label)
            .on_press_maybe((!controller.is_loading()).then_some(Msg::StartDownloadPressed))
            .padding([10, 20]),
    );

    section.into()
}

fn progress_section<'a>(controller: &'a JobController, progress: &'a ProgressData) -> Element<'a, Msg> {
    let percentage = progress.percentage.unwrap_or(0.0).clamp(0.0, 100.0) as f32;

    let heading = if controller.is_streaming() {
        "Downloading..."
    } else {
        "Download"
    };

    let mut section = column![
        row![
            text(heading).size(16),
            Space::new().width(Length::Fill),
            text(format!("{:.1}%", percentage)).size(16),
        ],
        progress_bar(0.0..=100.0, percentage),
        text(format!("Status: {}", progress.status.as_str())).size(16),
    ]
    .spacing(8);

    if let Some(downloaded) = progress.downloaded.filter(|d| *d > 0) {
        section = section.push(
            text(format!(
                "Downloaded: {} / {}",
                format_bytes(downloaded),
                format_bytes(progress.total.unwrap_or(0))
            ))
            .size(16),
        );
    }
    if let Some(speed) = progress.speed.filter(|s| *s > 0.0) {
        section = section.push(text(format!("Speed: {}/s", format_bytes(speed as u64))).size(16));
    }
    if let Some(eta) = progress.eta.filter(|e| *e > 0) {
        section = section.push(text(format!("ETA: {}s", eta)).size(16));
    }
    if let Some(job_id) = controller.job_id() {
        section = section.push(text(format!("Job: {}", job_id)).size(12));
    }
    if let Some(message) = progress.message.as_deref().filter(|m| !m.is_empty()) {
        section = section.push(text(format!("Message: {}", message)).size(16));
    }

    if progress.status == ProgressStatus::Completed {
        let saving = matches!(controller.file_save(), FileSave::ChoosingPath | FileSave::Saving(_));
        section = section.push(
            row![
                button("Download File")
                    .on_press_maybe((!saving).then_some(Msg::DownloadFilePressed))
                    .padding([10, 20]),
                button("Start New Download")
                    .on_press(Msg::NewDownloadPressed)
                    .padding([10, 20]),
            ]
            .spacing(10),
        );

        if let Some(line) = save_line(controller.file_save()) {
            section = section.push(text(line).size(14));
        }
    }

    section.into()
}

fn save_line(save: &FileSave) -> Option<String> {
    match save {
        FileSave::Idle => None,
        FileSave::ChoosingPath => Some("Please select save location...".to_string()),
        FileSave::Saving(fraction) => Some(format!("Saving: {:.1}%", fraction * 100.0)),
        FileSave::Saved(path) => Some(format!("Saved: {}", path.display())),
        FileSave::Cancelled => Some("Save cancelled".to_string()),
        FileSave::Failed(e) => Some(format!("Save failed: {}", e)),
    }
}
