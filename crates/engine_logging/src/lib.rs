#![deny(missing_docs)]
//! Shared logging utilities for the roomscout workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! the run logger initializer used by the binary and a minimal test initializer
//! for the global logger.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// File name of the run log inside a diagnostics directory.
pub const LOG_FILENAME: &str = "run.log";

/// Destination for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Append to `run.log` inside the given directory.
    File(PathBuf),
    /// Write to terminal (stdout).
    Terminal,
    /// Write to both the terminal and `run.log` inside the given directory.
    Both(PathBuf),
}

/// Initialize the global logger with the specified destination and level.
///
/// Returns the path of the log file when one was created. A file that cannot
/// be created is reported on stderr and the remaining loggers stay active.
pub fn initialize(destination: LogDestination, level: LevelFilter) -> Option<PathBuf> {
    let config = build_config();

    let (loggers, log_path): (Vec<Box<dyn SharedLogger>>, Option<PathBuf>) = match destination {
        LogDestination::File(dir) => match create_file_logger(&dir, level, config) {
            Some((logger, path)) => (vec![logger], Some(path)),
            None => return None,
        },
        LogDestination::Terminal => (
            vec![TermLogger::new(
                level,
                config,
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )],
            None,
        ),
        LogDestination::Both(dir) => {
            let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
                level,
                config.clone(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )];
            let mut log_path = None;
            if let Some((logger, path)) = create_file_logger(&dir, level, config) {
                loggers.push(logger);
                log_path = Some(path);
            }
            (loggers, log_path)
        }
    };

    let _ = CombinedLogger::init(loggers);
    log_path
}

/// Flushes buffered output of the global logger.
pub fn flush() {
    log::logger().flush();
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    dir: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<(Box<WriteLogger<File>>, PathBuf)> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("Warning: Could not create log directory {:?}: {}", dir, err);
        return None;
    }
    let log_path = dir.join(LOG_FILENAME);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);
    match file {
        Ok(file) => Some((WriteLogger::new(level, config, file), log_path)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
