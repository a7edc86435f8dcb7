//! The loop driver: owns the state record, asks the router for the next
//! step, and dispatches exactly one role at a time.
//!
//! Dispatch order is always router → role → router; roles never call each
//! other. Every trace entry a role appends is mirrored to the run log before
//! the next routing decision.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::agents::{self, Collaborators};
use crate::router::{route, Step};
use crate::run_log::RunLog;
use crate::state::{Role, RunState, StopReason, TraceEntry};

/// Final report handed back to the caller once the loop terminates.
#[derive(Debug)]
pub struct RunReport {
    pub stop_reason: StopReason,
    pub iterations: u32,
    pub trace: Vec<TraceEntry>,
}

pub struct Orchestrator {
    collab: Collaborators,
    run_log: RunLog,
}

impl Orchestrator {
    pub fn new(collab: Collaborators, run_log: RunLog) -> Self {
        Self { collab, run_log }
    }

    /// Drive one full run over `target` (a Python file or a directory).
    pub async fn run(&self, target: &Path, max_iterations: u32) -> Result<RunReport> {
        let mut state = RunState::new(target, max_iterations);
        self.populate_queue(&mut state)
            .with_context(|| format!("listing target {}", target.display()))?;

        self.run_log
            .startup(target, self.collab.provider.model_id(), max_iterations);
        info!(
            target = %target.display(),
            files = state.pending_files.len(),
            max_iterations,
            "run started"
        );

        let mut flushed = 0;
        loop {
            let step = route(&mut state);
            match step {
                Step::Run(Role::Auditor) => agents::auditor::run(&mut state, &self.collab),
                Step::Run(Role::Fixer) => agents::fixer::run(&mut state, &self.collab).await,
                Step::Run(Role::Judge) => agents::judge::run(&mut state, &self.collab),
                Step::Run(Role::Done) => {
                    // route() never dispatches Done; terminate defensively.
                    state.stop(StopReason::TestsPassing);
                }
                Step::Terminal(reason) => {
                    self.flush_trace(&state, flushed);
                    self.run_log.completion(reason, state.iteration_count);
                    info!(stop_reason = %reason, iterations = state.iteration_count, "run finished");
                    return Ok(RunReport {
                        stop_reason: reason,
                        iterations: state.iteration_count,
                        trace: state.trace().to_vec(),
                    });
                }
            }
            flushed = self.flush_trace(&state, flushed);
        }
    }

    /// FIFO queue of files to fix, in deterministic listing order. A single
    /// .py target becomes a one-element queue. A directory with no Python
    /// sources is an error: with nothing to fix and nothing to test, letting
    /// the loop run would end in a success that verified nothing.
    fn populate_queue(&self, state: &mut RunState) -> Result<()> {
        let files = if state.target.is_dir() {
            let files = self.collab.workspace.list_sources(&state.target)?;
            if files.is_empty() {
                bail!(
                    "no Python sources found under {}",
                    state.target.display()
                );
            }
            files
        } else {
            vec![state.target.clone()]
        };
        state.populate_queue(files);
        Ok(())
    }

    /// Mirror newly appended trace entries to the run log.
    fn flush_trace(&self, state: &RunState, from: usize) -> usize {
        let trace = state.trace();
        for entry in &trace[from..] {
            self.run_log.role_step(entry);
        }
        trace.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{collaborators, write_module};

    #[tokio::test]
    async fn single_file_run_reaches_tests_passing() {
        let (dir, mut collab) = collaborators();
        collab.provider = crate::test_support::provider_always("def add(a, b):\n    return a + b\n");
        let module = write_module(dir.path(), "calc.py", "def add(a, b):\n    return a - b\n");
        write_module(dir.path(), "test_calc.py", "def test_add():\n    assert True\n");

        let orch = Orchestrator::new(collab, RunLog::disabled());
        let report = orch.run(&module, 10).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::TestsPassing);
        // auditor, fixer, judge, then the terminal route.
        assert_eq!(report.iterations, 3);
        assert!(report.trace.iter().any(|e| e.action == "rewrite"));
        assert!(report.trace.iter().any(|e| e.action == "test_run"));
    }

    #[tokio::test]
    async fn trace_entries_are_mirrored_to_the_run_log() {
        let (dir, mut collab) = collaborators();
        collab.provider = crate::test_support::provider_always("x = 1\n");
        let module = write_module(dir.path(), "m.py", "x = 2\n");
        write_module(dir.path(), "test_m.py", "def test_m():\n    assert True\n");

        let log_dir = tempfile::tempdir().unwrap();
        let log_path = log_dir.path().join("run.jsonl");
        let orch = Orchestrator::new(collab, RunLog::new(Some(log_path.clone())));
        orch.run(&module, 10).await.unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines.first().unwrap().contains("startup"));
        assert!(lines.last().unwrap().contains("completion"));
        assert!(lines.iter().any(|l| l.contains("rewrite")));
    }
}
