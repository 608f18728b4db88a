mod api;
mod app;
mod application;
mod config;
mod domain;
mod logging;
mod ui;
mod utils;

use api::ApiClient;
use config::Settings;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env();
    logging::initialize(settings.log_level);

    let api_client = ApiClient::new(settings.api)?;

    iced::application(
        move || app::DownloadApp::new(api_client.clone()),
        app::update,
        app::view,
    )
    .title("MeTube Client")
    .run()?;

    Ok(())
}
