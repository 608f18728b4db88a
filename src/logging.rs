//! Terminal logging for the client.

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, ConfigBuilder, TermLogger, TerminalMode};

/// Installs the global logger. Safe to call more than once; later calls are
/// ignored.
pub fn initialize(level: LevelFilter) {
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        build_config(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        // reqwest, hyper and the iced runtime are chatty at debug
        .add_filter_allow_str("metube_client")
        .build()
}
