//! Append-only JSONL run log for post-run inspection.
//!
//! One record per role/tool invocation, plus a startup record first and a
//! completion record last. Records are only ever appended, never rewritten.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::{StopReason, TraceEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogRecord {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Role or "system" for lifecycle records.
    pub actor: String,
    pub action: String,
    pub detail: String,
    pub iteration: u32,
}

/// Append-only log sink. A `None` path disables persistence (tests, dry runs).
pub struct RunLog {
    path: Option<PathBuf>,
}

impl RunLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn append(&self, record: &RunLogRecord) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening run log {}", path.display()))?;
        let line = serde_json::to_string(record).context("serializing run log record")?;
        writeln!(file, "{line}").context("appending run log record")?;
        Ok(())
    }

    /// Log failures must never abort the run; they are reported and dropped.
    fn append_or_warn(&self, record: &RunLogRecord) {
        if let Err(e) = self.append(record) {
            tracing::warn!(error = %e, "run log append failed");
        }
    }

    pub fn startup(&self, target: &Path, model: &str, max_iterations: u32) {
        self.append_or_warn(&RunLogRecord {
            timestamp: Utc::now().to_rfc3339(),
            actor: "system".into(),
            action: "startup".into(),
            detail: format!(
                "target={} model={model} max_iterations={max_iterations} prompt_version={}",
                target.display(),
                crate::prompts::PROMPT_VERSION
            ),
            iteration: 0,
        });
    }

    pub fn role_step(&self, entry: &TraceEntry) {
        self.append_or_warn(&RunLogRecord {
            timestamp: Utc::now().to_rfc3339(),
            actor: entry.role.to_string(),
            action: entry.action.clone(),
            detail: entry.summary.clone(),
            iteration: entry.iteration,
        });
    }

    pub fn completion(&self, stop_reason: StopReason, iterations: u32) {
        self.append_or_warn(&RunLogRecord {
            timestamp: Utc::now().to_rfc3339(),
            actor: "system".into(),
            action: "completion".into(),
            detail: format!("stop_reason={stop_reason}"),
            iteration: iterations,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Role;

    #[test]
    fn records_append_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/run.jsonl");
        let log = RunLog::new(Some(path.clone()));

        log.startup(Path::new("sandbox"), "test-model", 10);
        log.role_step(&TraceEntry {
            role: Role::Auditor,
            action: "lint_summary".into(),
            summary: "score 4.2/10".into(),
            iteration: 1,
        });
        log.completion(StopReason::TestsPassing, 6);

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<RunLogRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].action, "startup");
        // Startup ties the run to the prompts that produced it.
        assert!(records[0]
            .detail
            .contains(&format!("prompt_version={}", crate::prompts::PROMPT_VERSION)));
        assert_eq!(records[1].actor, "auditor");
        assert_eq!(records[2].action, "completion");
        assert!(records[2].detail.contains("tests_passing"));
    }

    #[test]
    fn disabled_log_is_a_noop() {
        let log = RunLog::disabled();
        log.startup(Path::new("x"), "m", 1);
        log.completion(StopReason::RateLimited, 1);
        assert!(log.path().is_none());
    }
}
