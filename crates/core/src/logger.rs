use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

pub const LOG_FILE: &str = "autorunner.log";

struct Logger {
    file: Option<File>,
}

/// Initialize the global logger. Clears the log file.
///
/// If the log file cannot be opened, lines still go to stdout.
pub fn init(log_dir: &Path) {
    fs::create_dir_all(log_dir).ok();
    let log_path = log_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path);

    let file = match file {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("cannot open {}: {}", log_path.display(), e);
            None
        }
    };

    LOGGER
        .set(Mutex::new(Logger { file }))
        .ok();
}

fn write_log(level: &str, prefix: &str, msg: &str) {
    let Some(logger) = LOGGER.get() else { return };
    let ts = Local::now().format("%H:%M:%S").to_string();

    let line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level, msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
    };

    if let Ok(mut l) = logger.lock() {
        if let Some(file) = l.file.as_mut() {
            writeln!(file, "{}", line).ok();
        }
        println!("{}", line);
    }
}

pub fn info(msg: &str) {
    write_log("INFO", "", msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", msg);
}

/// Log tagged with the component that produced the line.
pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, msg);
}
