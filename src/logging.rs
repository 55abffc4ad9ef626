//! Run-scoped logging.
//!
//! A run classifies every message it emits, success lines and fatal
//! conditions alike, under one severity chosen at startup. [`RunLog`]
//! captures that choice once and forwards messages through the `log`
//! facade, so the embedding binary decides where records actually go.

use log::Level;

/// Maps a configured level name to a `log` severity.
///
/// Names are matched case-insensitively. Unrecognized names map to the
/// most severe level.
fn parse_level(name: &str) -> Level {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warn" => Level::Warn,
        "error" => Level::Error,
        _ => Level::Error,
    }
}

/// Severity sink a run writes all of its records under.
#[derive(Debug)]
pub struct RunLog {
    level: Level,
}

impl RunLog {
    /// Builds a sink that classifies every record under `level_name`.
    pub fn new(level_name: &str) -> Self {
        Self {
            level: parse_level(level_name),
        }
    }

    /// Severity this run records under.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Emits one record at the run's severity.
    pub fn log(&self, message: &str) {
        log::log!(self.level, "{}", message);
    }
}
