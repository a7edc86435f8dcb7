//! Judge role: run the test suite over the target scope and decide where
//! control goes next.
//!
//! Passing → the in-flight file is resolved; with an empty queue the run
//! stops as `tests_passing`, otherwise the Fixer picks up the next file.
//! Anything else (failures, collection errors, no tests) → back to the
//! Auditor for another cycle. A runner launch failure is classified as a
//! collection error so the loop keeps moving instead of crashing.

use std::path::PathBuf;

use tracing::{info, warn};

use super::Collaborators;
use crate::state::{Role, RunState, StopReason};
use crate::test_runner::{classify, TestOutcome, TestStatus};

pub fn run(state: &mut RunState, collab: &Collaborators) {
    let scope = test_scope(state);

    let outcome = match collab.runner.run(&scope) {
        Ok(raw) => classify(&raw),
        Err(e) => {
            warn!(error = %e, "test runner failed to launch");
            TestOutcome {
                status: TestStatus::CollectionError,
                counts: None,
                raw_summary: format!("runner launch failed: {e}"),
            }
        }
    };

    info!(status = ?outcome.status, "judge verdict");
    state.push_trace(Role::Judge, "test_run", describe(&outcome));
    state.last_outcome = Some(outcome.status);

    if outcome.status == TestStatus::Passing {
        let resolved = state.resolve_current();
        if let Some(file) = resolved {
            state.push_trace(
                Role::Judge,
                "file_resolved",
                file.file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| file.display().to_string()),
            );
        }
        if state.pending_files.is_empty() {
            state.stop(StopReason::TestsPassing);
        } else {
            state.active_role = Role::Fixer;
        }
    } else {
        state.active_role = Role::Auditor;
    }
}

/// Tests run over the whole target directory; for a single-file target the
/// containing directory is used so companion test files are collected.
fn test_scope(state: &RunState) -> PathBuf {
    if state.target.is_dir() {
        state.target.clone()
    } else {
        state
            .target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn describe(outcome: &TestOutcome) -> String {
    match (&outcome.status, &outcome.counts) {
        (status, Some(c)) => format!(
            "{status:?}: {} passed, {} failed, {} errors",
            c.passed, c.failed, c.errors
        ),
        (status, None) => format!("{status:?}: {}", outcome.raw_summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{collaborators, runner_with_exit, write_module};

    #[test]
    fn passing_with_empty_queue_stops_tests_passing() {
        let (dir, mut collab) = collaborators();
        collab.runner = runner_with_exit(0, "1 passed in 0.01s");
        write_module(dir.path(), "calc.py", "x = 1\n");

        let mut state = RunState::new(dir.path(), 10);
        state.current_file = Some(dir.path().join("calc.py"));

        run(&mut state, &collab);

        assert_eq!(state.stop_reason, Some(StopReason::TestsPassing));
        assert_eq!(state.active_role, Role::Done);
        assert!(state.current_file.is_none());
        assert!(state.last_outcome == Some(TestStatus::Passing));
    }

    #[test]
    fn passing_with_pending_queue_routes_to_fixer() {
        let (dir, mut collab) = collaborators();
        collab.runner = runner_with_exit(0, "3 passed in 0.02s");

        let mut state = RunState::new(dir.path(), 10);
        state.current_file = Some(dir.path().join("a.py"));
        state.populate_queue(vec![dir.path().join("b.py")]);

        run(&mut state, &collab);

        assert_eq!(state.stop_reason, None);
        assert_eq!(state.active_role, Role::Fixer);
        // Slot cleared so the Fixer pops b.py next.
        assert!(state.current_file.is_none());
    }

    #[test]
    fn failures_route_back_to_auditor_and_keep_current() {
        let (dir, mut collab) = collaborators();
        collab.runner = runner_with_exit(1, "1 failed, 2 passed in 0.03s");

        let mut state = RunState::new(dir.path(), 10);
        state.current_file = Some(dir.path().join("a.py"));

        run(&mut state, &collab);

        assert_eq!(state.active_role, Role::Auditor);
        assert_eq!(state.current_file, Some(dir.path().join("a.py")));
        assert_eq!(state.last_outcome, Some(TestStatus::Failing));
    }

    #[test]
    fn collection_error_recorded_for_fixer_policy() {
        let (dir, mut collab) = collaborators();
        collab.runner = runner_with_exit(2, "ERROR collecting test_a.py");

        let mut state = RunState::new(dir.path(), 10);
        run(&mut state, &collab);

        assert_eq!(state.last_outcome, Some(TestStatus::CollectionError));
        assert_eq!(state.active_role, Role::Auditor);
    }

    #[test]
    fn runner_launch_failure_is_collection_error() {
        let (dir, mut collab) = collaborators();
        collab.runner = crate::test_support::failing_runner();

        let mut state = RunState::new(dir.path(), 10);
        run(&mut state, &collab);

        assert_eq!(state.last_outcome, Some(TestStatus::CollectionError));
        assert_eq!(state.active_role, Role::Auditor);
        assert!(state.stop_reason.is_none());
    }
}
