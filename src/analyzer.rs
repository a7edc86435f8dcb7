//! Static-analysis collaborator (pylint).
//!
//! The Auditor treats analysis output as advisory text: a score line and the
//! issue listing. Failures here are never fatal to the run.

use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// The static-analysis collaborator.
pub trait Analyzer: Send + Sync {
    /// Produce a defect/quality summary for the given files.
    fn analyze(&self, paths: &[PathBuf]) -> Result<String>;
}

/// Subprocess pylint analyzer.
pub struct PylintAnalyzer;

impl Analyzer for PylintAnalyzer {
    fn analyze(&self, paths: &[PathBuf]) -> Result<String> {
        let output = Command::new("pylint")
            .args(paths)
            .arg("--output-format=text")
            .output()
            .context("failed to launch pylint")?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(summarize_report(&text))
    }
}

fn score_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"rated at (-?\d+(?:\.\d+)?)/10").unwrap())
}

/// Extract the quality score from a pylint report, if present.
pub fn extract_score(report: &str) -> Option<f64> {
    score_regex()
        .captures(report)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Condense a raw pylint report into a trace-sized summary: the score plus
/// the first batch of issue lines.
fn summarize_report(report: &str) -> String {
    const MAX_ISSUE_LINES: usize = 15;
    let score = extract_score(report)
        .map(|s| format!("score {s:.2}/10"))
        .unwrap_or_else(|| "score unavailable".to_string());
    let issues: Vec<&str> = report
        .lines()
        .filter(|line| {
            // Issue lines look like "module.py:12:0: C0114: Missing module docstring".
            line.contains(": C")
                || line.contains(": W")
                || line.contains(": E")
                || line.contains(": R")
        })
        .take(MAX_ISSUE_LINES)
        .collect();
    if issues.is_empty() {
        score
    } else {
        format!("{score}\n{}", issues.join("\n"))
    }
}

/// Bounded prefix of files the Auditor inspects (cost control).
pub fn audit_sample(files: &[PathBuf], cap: usize) -> &[PathBuf] {
    &files[..files.len().min(cap)]
}
