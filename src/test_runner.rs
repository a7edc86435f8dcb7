//! Test-execution collaborator (pytest) and the outcome classifier.
//!
//! The classifier is the load-bearing piece: an empty result set is ambiguous
//! between "everything passes" and "nothing ran", so raw pytest results are
//! normalized into four distinct statuses before the Judge looks at them.
//! Pytest's exit codes carry the signal: 0 = pass, 1 = failures, 2 =
//! interrupted (collection errors), 5 = no tests collected.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pytest exit code for "no tests were collected".
const EXIT_NO_TESTS: i32 = 5;
/// Pytest exit code for "test session was interrupted" (collection errors).
const EXIT_INTERRUPTED: i32 = 2;

/// Raw result of one test-collaborator invocation.
#[derive(Debug, Clone)]
pub struct RawTestResult {
    /// Process exit code; `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub output: String,
}

/// Normalized classification of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passing,
    Failing,
    /// Zero tests ran because none exist; never conflated with passing.
    NoTestsCollected,
    /// Zero tests ran because collection itself failed (import errors etc).
    CollectionError,
}

/// Structured pass/fail/error totals from the pytest summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub passed: u32,
    pub failed: u32,
    pub errors: u32,
}

/// Value handed to the Judge; discarded after the decision.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub status: TestStatus,
    /// Absent for collection errors where no summary line was produced.
    pub counts: Option<TestCounts>,
    pub raw_summary: String,
}

/// The test-execution collaborator.
pub trait TestRunner: Send + Sync {
    /// Run the test suite scoped to `target` (a directory).
    fn run(&self, target: &Path) -> Result<RawTestResult>;
}

/// Subprocess pytest runner.
pub struct PytestRunner;

impl TestRunner for PytestRunner {
    fn run(&self, target: &Path) -> Result<RawTestResult> {
        let output = Command::new("pytest")
            .arg(target)
            .args(["-q", "--tb=short"])
            .output()
            .context("failed to launch pytest")?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(RawTestResult {
            exit_code: output.status.code(),
            output: text,
        })
    }
}

fn counts_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+(passed|failed|error)").unwrap())
}

/// Parse pass/fail/error totals from the pytest `-q` summary line.
fn parse_counts(output: &str) -> TestCounts {
    let mut counts = TestCounts::default();
    for cap in counts_regex().captures_iter(output) {
        let n: u32 = cap[1].parse().unwrap_or(0);
        match &cap[2] {
            "passed" => counts.passed = n,
            "failed" => counts.failed = n,
            "error" => counts.errors = n,
            _ => {}
        }
    }
    counts
}

/// Trailing slice of the raw output carried into the trace.
fn summarize(output: &str) -> String {
    const KEEP: usize = 400;
    let trimmed = output.trim();
    if trimmed.len() <= KEEP {
        return trimmed.to_string();
    }
    let tail_start = trimmed.len() - KEEP;
    let boundary = trimmed
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= tail_start)
        .unwrap_or(tail_start);
    format!("…{}", &trimmed[boundary..])
}

/// Normalize a raw test-execution result into a `TestOutcome`.
pub fn classify(raw: &RawTestResult) -> TestOutcome {
    let counts = parse_counts(&raw.output);
    let raw_summary = summarize(&raw.output);
    let collection_error_signature = raw.output.contains("errors during collection")
        || raw.output.contains("ERROR collecting");

    let status = match raw.exit_code {
        Some(0) => TestStatus::Passing,
        Some(EXIT_NO_TESTS) => TestStatus::NoTestsCollected,
        Some(EXIT_INTERRUPTED) => TestStatus::CollectionError,
        Some(1) => {
            // Exit 1 with nothing executed and error signatures in the output
            // is a collection failure, not a test failure.
            if collection_error_signature && counts.passed == 0 && counts.failed == 0 {
                TestStatus::CollectionError
            } else {
                TestStatus::Failing
            }
        }
        // Usage errors, internal errors, signals: nothing ran.
        _ => TestStatus::CollectionError,
    };

    let counts = match status {
        TestStatus::CollectionError => None,
        _ => Some(counts),
    };

    TestOutcome {
        status,
        counts,
        raw_summary,
    }
}
