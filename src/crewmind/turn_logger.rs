//! Turn-by-turn JSON logging for orchestrator and subagent runs.
//!
//! When a logging directory is configured, every turn is written as
//! `{prefix}_turn_{NNN}.json` and each run ends with a
//! `{prefix}_summary.json`.  Logging is strictly best-effort: a logger built
//! without a directory is a no-op, and write failures are logged and
//! swallowed so they can never take down a run.

use std::fs;
use std::path::PathBuf;

use serde_json::Value;

/// Writes per-turn JSON artifacts for one agent run.
pub struct TurnLogger {
    logging_dir: Option<PathBuf>,
    prefix: String,
}

impl TurnLogger {
    /// Create a logger writing under `logging_dir` with the given file
    /// prefix (e.g. `"orchestrator"`, `"subagent_task_001"`).  `None`
    /// disables logging entirely.
    pub fn new(logging_dir: Option<PathBuf>, prefix: &str) -> Self {
        let logging_dir = logging_dir.and_then(|dir| match fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                log::error!("Failed to create logging dir {}: {}", dir.display(), e);
                None
            }
        });

        TurnLogger {
            logging_dir,
            prefix: prefix.to_string(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.logging_dir.is_some()
    }

    fn write(&self, file_name: &str, mut data: Value) -> Option<PathBuf> {
        let dir = self.logging_dir.as_ref()?;

        if let Value::Object(map) = &mut data {
            map.insert(
                "timestamp".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
            map.insert("prefix".to_string(), Value::String(self.prefix.clone()));
        }

        let path = dir.join(file_name);
        let serialized = match serde_json::to_string_pretty(&data) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to serialize log data for {}: {}", path.display(), e);
                return None;
            }
        };

        match fs::write(&path, serialized) {
            Ok(()) => Some(path),
            Err(e) => {
                log::error!("Failed to write log file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Log one turn's data; returns the path when a file was written.
    pub fn log_turn(&self, turn_num: usize, mut data: Value) -> Option<PathBuf> {
        if let Value::Object(map) = &mut data {
            map.insert("turn_number".to_string(), Value::from(turn_num));
        }
        let path = self.write(&format!("{}_turn_{:03}.json", self.prefix, turn_num), data);
        if let Some(path) = &path {
            log::debug!("Logged turn {} to {}", turn_num, path.display());
        }
        path
    }

    /// Log the final run summary.
    pub fn log_final_summary(&self, data: Value) -> Option<PathBuf> {
        let path = self.write(&format!("{}_summary.json", self.prefix), data);
        if let Some(path) = &path {
            log::info!("Logged summary to {}", path.display());
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disabled_logger_is_a_no_op() {
        let logger = TurnLogger::new(None, "test");
        assert!(!logger.enabled());
        assert!(logger.log_turn(1, json!({"a": 1})).is_none());
        assert!(logger.log_final_summary(json!({"b": 2})).is_none());
    }

    #[test]
    fn writes_turn_and_summary_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logger = TurnLogger::new(Some(dir.path().to_path_buf()), "unit");

        let turn_path = logger.log_turn(3, json!({"value": 42})).expect("turn path");
        assert!(turn_path.ends_with("unit_turn_003.json"));

        let summary_path = logger
            .log_final_summary(json!({"completed": true}))
            .expect("summary path");
        assert!(summary_path.ends_with("unit_summary.json"));

        let raw = fs::read_to_string(&turn_path).expect("readable");
        let value: Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(value["value"], 42);
        assert_eq!(value["turn_number"], 3);
        assert_eq!(value["prefix"], "unit");
    }
}
