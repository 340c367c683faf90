//! Logger setup.
//!
//! All modules log through the [`log`] facade; this installs the
//! [`simplelog`] backend once at startup.

use std::fs::OpenOptions;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Where log records go.
pub enum LogDestination {
    /// Standard error / standard output only.
    Terminal,
    /// Terminal plus an appended log file.
    TerminalAndFile(PathBuf),
}

/// Install the global logger.  Calling this twice keeps the first logger.
pub fn initialize(destination: LogDestination) {
    let level = LevelFilter::Info;
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let LogDestination::TerminalAndFile(path) = destination {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
            Err(err) => eprintln!("Warning: could not open log file {:?}: {}", path, err),
        }
    }

    let _ = CombinedLogger::init(loggers);
}

/// Terminal logger for unit tests; a no-op when one is already installed.
#[cfg(test)]
pub fn initialize_for_tests() {
    let _ = CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Never,
    )]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}
