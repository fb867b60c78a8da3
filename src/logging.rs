use std::str::FromStr;
use std::time::Duration;

use log::{LevelFilter, info};
use simplelog::{ConfigBuilder, WriteLogger};

use crate::config::{LoggingConfig, expand_path};

/// Install a file logger appending to the configured path
/// (~/.local/share/shl/shl.log by default).
/// Best-effort: failures are silently ignored (logging must never block
/// execution).
pub fn init(config: &LoggingConfig) {
    if !config.enabled {
        return;
    }
    let level = LevelFilter::from_str(&config.level).unwrap_or(LevelFilter::Info);
    let path = expand_path(&config.file);
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    else {
        return;
    };
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let _ = WriteLogger::init(level, log_config, file);
}

/// Compact single-line form of a command line, capped at 200 chars.
fn compact(line: &str) -> String {
    line.replace('\n', "; ").chars().take(200).collect()
}

/// Record one completed execution.
pub fn log_execution(line: &str, exit_code: i32, duration: Duration) {
    info!(
        "exit={exit_code}\t{ms}ms\t{cmd}",
        ms = duration.as_millis(),
        cmd = compact(line),
    );
}
