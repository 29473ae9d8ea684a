use anyhow::{Context, Result};
use crossterm::style::Stylize;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fmt::Display;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Logger writing to a rotating file, echoing important records to stderr
struct PixgridLogger {
    file_writer: Arc<Mutex<RollingFileAppender>>,
    file_level: LevelFilter,
    stderr_level: LevelFilter,
}

impl Log for PixgridLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.file_level || metadata.level() <= self.stderr_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = record.level();
        let timestamp = chrono::Local::now();

        if level <= self.file_level
            && let Ok(mut writer) = self.file_writer.lock()
        {
            let _ = writeln!(
                writer,
                "{} [{}] {}: {}",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
                level,
                record.target(),
                record.args()
            );
        }

        // stdout carries the graphics, keep messages off it
        if level <= self.stderr_level {
            let line = format!("[{}] {}", level, record.args());
            let line = match level {
                Level::Error => line.red().to_string(),
                Level::Warn => line.yellow().to_string(),
                _ => line,
            };
            let _ = writeln!(io::stderr(), "{}", line);
        }
    }

    fn flush(&self) {
        // RollingFileAppender flushes on every write
    }
}

/// Parse log level string to LevelFilter
pub fn parse_level(level_str: &str) -> LevelFilter {
    match level_str.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Install the file logger as the global logger
pub fn init_logger(log_file_path: PathBuf, file_level: &str, stderr_level: &str) -> Result<()> {
    let directory = log_file_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid log file path"))?;
    fs::create_dir_all(directory).context("Failed to create log directory")?;

    // Daily rotation, three files kept
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(3)
        .filename_prefix(
            log_file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("pixgrid"),
        )
        .filename_suffix(
            log_file_path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("log"),
        )
        .build(directory)
        .context("Failed to create rotating file appender")?;

    let file_level = parse_level(file_level);
    let stderr_level = parse_level(stderr_level);

    let logger = PixgridLogger {
        file_writer: Arc::new(Mutex::new(file_appender)),
        file_level,
        stderr_level,
    };

    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(file_level.max(stderr_level));

    Ok(())
}

/// Report a recovered error to the user, in red on stderr
pub fn diagnostic<E: Display + ?Sized>(err: &E) {
    log::debug!("Recovered from: {}", err);
    let _ = writeln!(io::stderr(), "{}", err.to_string().red());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }

    #[test]
    fn test_logger_writes_to_rotating_file() {
        let dir = tempfile::tempdir().unwrap();
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix("test")
            .filename_suffix("log")
            .build(dir.path())
            .unwrap();
        let logger = PixgridLogger {
            file_writer: Arc::new(Mutex::new(appender)),
            file_level: LevelFilter::Info,
            stderr_level: LevelFilter::Off,
        };

        assert!(logger.enabled(&Metadata::builder().level(Level::Info).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));

        logger.log(
            &Record::builder()
                .args(format_args!("grid drawn"))
                .level(Level::Info)
                .target("pixgrid::grid")
                .build(),
        );

        let written: String = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| fs::read_to_string(entry.path()).unwrap())
            .collect();
        assert!(written.contains("[INFO] pixgrid::grid: grid drawn"));
    }
}
