use chrono::Local;
use fern::Dispatch;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use std::fs;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "simulation.log";

/// Initializes the global logger.
///
/// Console verbosity follows `RUST_LOG` (default `info`), e.g. `RUST_LOG=debug fog_workflow_sim ...`
/// prints every protocol step. The log file `logs/simulation.log` always records at `debug`.
///
/// Calling this twice leaves the first configuration in place and prints a notice to stderr.
pub fn init() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create log directory at '{}': {}", LOG_DIR, e);
    }

    let log_file_path = format!("{}/{}", LOG_DIR, LOG_FILE);

    let console_level = std::env::var("RUST_LOG").ok().and_then(|level| level.parse::<LevelFilter>().ok()).unwrap_or(LevelFilter::Info);

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    let console_config = Dispatch::new()
        .level(console_level)
        .format(move |out, message, record| {
            out.finish(format_args!("[{} {} {}] {}", Local::now().format("%H:%M:%S%.3f"), colors.color(record.level()), record.target(), message))
        })
        .chain(std::io::stderr());

    let mut base_config = Dispatch::new()
        .level(LevelFilter::Debug)
        .level_for("serde", LevelFilter::Warn)
        .level_for("rand", LevelFilter::Warn)
        .chain(console_config);

    match fern::log_file(&log_file_path) {
        Ok(file) => {
            let file_config = Dispatch::new().level(LevelFilter::Debug).format(|out, message, record| {
                out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"), record.level(), record.target(), message))
            });
            base_config = base_config.chain(file_config.chain(file));
        }
        Err(e) => eprintln!("Failed to open log file '{}': {}. Logging to console only.", log_file_path, e),
    }

    if let Err(e) = base_config.apply() {
        eprintln!("Failed to apply logger configuration: {}", e);
        return;
    }

    log::info!("Logger initialized. Console level {}, file '{}'.", console_level, log_file_path);
}
