use anyhow::Result;
use chrono::Utc;
use mentor_core::{GenerationKind, runtime_dir};
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of one generation request, as recorded in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Accepted { items: usize },
    Recovered { detail: String },
    Superseded,
    Failed { detail: String },
}

pub struct Observer {
    log_path: PathBuf,
    verbose: bool,
    stderr_enabled: bool,
}

impl Observer {
    pub fn new(workspace: &Path) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            log_path: dir.join("observe.log"),
            verbose: false,
            stderr_enabled: true,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Enable or disable verbose logging to stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// The TUI owns the terminal; while it runs, logs go to the file only.
    pub fn set_stderr_enabled(&mut self, enabled: bool) {
        self.stderr_enabled = enabled;
    }

    /// Log a message to stderr with `[mentor]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose && self.stderr_enabled {
            eprintln!("[mentor] {msg}");
        }
        if self.verbose {
            let _ = self.append_log_line(&format!("{} DEBUG {msg}", Utc::now().to_rfc3339()));
        }
    }

    pub fn info_log(&self, msg: &str) {
        let _ = self.append_log_line(&format!("{} INFO {msg}", Utc::now().to_rfc3339()));
    }

    /// Log a warning: always written to the log file, and to stderr.
    pub fn warn_log(&self, msg: &str) {
        if self.stderr_enabled {
            eprintln!("[mentor WARN] {msg}");
        }
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    pub fn error_log(&self, msg: &str) {
        if self.stderr_enabled {
            eprintln!("[mentor ERROR] {msg}");
        }
        let _ = self.append_log_line(&format!("{} ERROR {msg}", Utc::now().to_rfc3339()));
    }

    pub fn record_generation(
        &self,
        kind: GenerationKind,
        seq: u64,
        outcome: &GenerationOutcome,
    ) -> Result<()> {
        let payload = match outcome {
            GenerationOutcome::Accepted { items } => {
                json!({"kind": kind, "seq": seq, "outcome": "accepted", "items": items})
            }
            GenerationOutcome::Recovered { detail } => {
                json!({"kind": kind, "seq": seq, "outcome": "recovered", "detail": detail})
            }
            GenerationOutcome::Superseded => {
                json!({"kind": kind, "seq": seq, "outcome": "superseded"})
            }
            GenerationOutcome::Failed { detail } => {
                json!({"kind": kind, "seq": seq, "outcome": "failed", "detail": detail})
            }
        };
        self.verbose_log(&format!("{kind} #{seq}: {payload}"));
        self.append_log_line(&format!(
            "{} GENERATION {}",
            Utc::now().to_rfc3339(),
            serde_json::to_string(&payload)?
        ))
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_outcomes_are_written_as_json_lines() {
        let workspace = tempfile::tempdir().expect("workspace");
        let observer = Observer::new(workspace.path()).expect("observer");
        observer
            .record_generation(
                GenerationKind::Flashcards,
                3,
                &GenerationOutcome::Recovered {
                    detail: "expected array".to_string(),
                },
            )
            .expect("record");

        let log = fs::read_to_string(observer.log_path()).expect("log");
        let line = log.lines().last().expect("one line");
        assert!(line.contains(" GENERATION "));
        let payload: serde_json::Value =
            serde_json::from_str(line.split_once(" GENERATION ").expect("tag").1).expect("json");
        assert_eq!(payload["kind"], "flashcards");
        assert_eq!(payload["outcome"], "recovered");
        assert_eq!(payload["seq"], 3);
    }

    #[test]
    fn warnings_reach_the_log_file_even_when_stderr_is_muted() {
        let workspace = tempfile::tempdir().expect("workspace");
        let mut observer = Observer::new(workspace.path()).expect("observer");
        observer.set_stderr_enabled(false);
        observer.warn_log("stored state is corrupt");
        observer.verbose_log("hidden unless verbose");

        let log = fs::read_to_string(observer.log_path()).expect("log");
        assert!(log.contains("WARN stored state is corrupt"));
        assert!(!log.contains("hidden unless verbose"));
    }
}
