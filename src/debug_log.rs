//! Log backend for terrain editing.
//!
//! Routes the `log` facade to the Godot console and, once
//! `init_debug_log()` has been called, mirrors every record into
//! `debug_terrain_edit.log` in the working directory. The file is
//! recreated on each init.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use godot::prelude::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::EditResult;

pub const DEBUG_LOG_FILE: &str = "debug_terrain_edit.log";

lazy_static::lazy_static! {
    static ref DEBUG_LOG: Mutex<Option<File>> = Mutex::new(None);
}

struct GodotLogger;

static LOGGER: GodotLogger = GodotLogger;

impl Log for GodotLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(record);
        match record.level() {
            Level::Error => godot_error!("{}", line),
            Level::Warn => godot_warn!("{}", line),
            _ => godot_print!("{}", line),
        }
        debug_log(&line);
    }

    fn flush(&self) {
        if let Ok(mut guard) = DEBUG_LOG.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

fn format_record(record: &Record) -> String {
    format!("[{}] {}: {}", record.level(), record.target(), record.args())
}

/// Install the Godot logger. Later calls only change the level.
pub fn init_logger(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_err() {
        log::debug!("Logger already installed");
    }
    log::set_max_level(level);
}

/// Append a line to the debug log file, if one is open.
pub fn debug_log(msg: &str) {
    if let Ok(mut guard) = DEBUG_LOG.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "{}", msg);
        }
    }
}

/// Create (or truncate) the debug log in the working directory.
pub fn init_debug_log() -> EditResult<()> {
    init_debug_log_at(DEBUG_LOG_FILE)
}

pub fn init_debug_log_at(path: impl AsRef<Path>) -> EditResult<()> {
    let mut file = File::create(path)?;
    writeln!(file, "=== PIXY LANDSCAPE EDIT LOG ===")?;
    writeln!(file, "Timestamp: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;
    if let Ok(mut guard) = DEBUG_LOG.lock() {
        *guard = Some(file);
    }
    Ok(())
}

/// Flush and close the debug log file.
pub fn close_debug_log() {
    if let Ok(mut guard) = DEBUG_LOG.lock() {
        if let Some(mut file) = guard.take() {
            let _ = file.flush();
        }
    }
}
