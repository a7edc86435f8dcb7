//! Shared orchestration state threaded through every role step.
//!
//! The `RunState` record is owned by the loop driver and handed to exactly
//! one role at a time. Roles mutate it in place (set the next role, drain the
//! queue, append trace entries) and return control to the router. Invariants:
//!
//! 1. `active_role` is always one of the four `Role` variants; `Done` is terminal.
//! 2. `pending_files` holds unique entries and only shrinks after population.
//! 3. `current_file`, while set, is never also present in `pending_files`.
//! 4. `stop_reason` is set at most once; once set the loop must not continue.
//! 5. `trace` is append-only and chronological.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The actor that runs in the next orchestration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Reads a bounded sample of the target and summarizes its defects.
    Auditor,
    /// Rewrites one file via the model provider and repairs its tests.
    Fixer,
    /// Runs the test collaborator and decides where control goes next.
    Judge,
    /// Terminal; no further role runs.
    Done,
}

impl Role {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auditor => write!(f, "auditor"),
            Self::Fixer => write!(f, "fixer"),
            Self::Judge => write!(f, "judge"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Terminal classification of why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Judge observed a passing outcome with nothing left in the queue.
    TestsPassing,
    /// The iteration ceiling was reached before the queue resolved.
    ExhaustedIterations,
    /// The provider stayed rate-limited past the retry budget.
    RateLimited,
    /// The loop had no work left without ever reaching a verified pass.
    NoProgress,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestsPassing => write!(f, "tests_passing"),
            Self::ExhaustedIterations => write!(f, "exhausted_iterations"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::NoProgress => write!(f, "no_progress"),
        }
    }
}

/// One human-readable record of a role action, in strict step order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub role: Role,
    /// Short action tag, e.g. "lint_summary", "rewrite", "test_run".
    pub action: String,
    pub summary: String,
    /// Iteration at the time the entry was appended.
    pub iteration: u32,
}

/// The single mutable record describing run progress.
#[derive(Debug)]
pub struct RunState {
    pub active_role: Role,
    /// File or directory the run operates on. Fixed for the run's lifetime.
    pub target: PathBuf,
    /// FIFO of files still waiting for a fix cycle. Unique, populated once.
    pub pending_files: VecDeque<PathBuf>,
    /// The file currently being worked on, if a cycle is in flight.
    pub current_file: Option<PathBuf>,
    /// Outcome of the most recent Judge step, keyed by `current_file`.
    /// Consulted by the Fixer's test-repair policy.
    pub last_outcome: Option<crate::test_runner::TestStatus>,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub stop_reason: Option<StopReason>,
    trace: Vec<TraceEntry>,
}

impl RunState {
    pub fn new(target: impl Into<PathBuf>, max_iterations: u32) -> Self {
        Self {
            active_role: Role::Auditor,
            target: target.into(),
            pending_files: VecDeque::new(),
            current_file: None,
            last_outcome: None,
            iteration_count: 0,
            max_iterations,
            stop_reason: None,
            trace: Vec::new(),
        }
    }

    /// Populate the queue from a deterministic listing. Only valid once,
    /// before any role has run; duplicates and the current file are skipped.
    pub fn populate_queue(&mut self, files: impl IntoIterator<Item = PathBuf>) {
        for file in files {
            if Some(&file) != self.current_file.as_ref() && !self.pending_files.contains(&file) {
                self.pending_files.push_back(file);
            }
        }
    }

    /// Promote the queue head into the current slot.
    ///
    /// Returns the file now being worked on: the existing `current_file` when
    /// one is already in flight, else the popped head. `None` means both the
    /// slot and the queue are empty; the state machine should never have
    /// dispatched the Fixer in that case.
    pub fn select_file(&mut self) -> Option<PathBuf> {
        if self.current_file.is_none() {
            self.current_file = self.pending_files.pop_front();
        }
        self.current_file.clone()
    }

    /// Mark the in-flight file resolved, clearing the current slot.
    pub fn resolve_current(&mut self) -> Option<PathBuf> {
        self.last_outcome = None;
        self.current_file.take()
    }

    /// Record a terminal stop. First writer wins; a later attempt to change
    /// an already-set reason is a bug upstream, so it is ignored and logged.
    pub fn stop(&mut self, reason: StopReason) {
        if let Some(existing) = self.stop_reason {
            if existing != reason {
                tracing::warn!(%existing, attempted = %reason, "stop_reason already set, keeping first");
            }
            return;
        }
        self.stop_reason = Some(reason);
        self.active_role = Role::Done;
    }

    pub fn push_trace(&mut self, role: Role, action: &str, summary: impl Into<String>) {
        let entry = TraceEntry {
            role,
            action: action.to_string(),
            summary: summary.into(),
            iteration: self.iteration_count,
        };
        tracing::debug!(role = %entry.role, action = %entry.action, iteration = entry.iteration, "trace");
        self.trace.push(entry);
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Most recent trace summary for a given action tag, if any.
    pub fn last_trace_summary(&self, action: &str) -> Option<&str> {
        self.trace
            .iter()
            .rev()
            .find(|e| e.action == action)
            .map(|e| e.summary.as_str())
    }
}
