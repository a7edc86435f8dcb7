//! Shared scripted collaborators for the role unit tests.
//!
//! Everything here runs without Python or a network: the provider, analyzer,
//! runner, and validator are scripted, while the workspace is a real tempdir.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::agents::Collaborators;
use crate::analyzer::Analyzer;
use crate::backoff::RetryPolicy;
use crate::provider::{CompletionRequest, ModelProvider, ProviderError};
use crate::test_runner::{RawTestResult, TestRunner};
use crate::testgen::SourceValidator;
use crate::workspace::Workspace;

/// Provider that pops scripted results in order; after the script runs out,
/// the last response repeats.
pub struct ScriptedProvider {
    script: Mutex<Vec<Result<String, ProviderError>>>,
    fallback: Result<String, ProviderError>,
}

fn clone_result(r: &Result<String, ProviderError>) -> Result<String, ProviderError> {
    match r {
        Ok(s) => Ok(s.clone()),
        Err(ProviderError::RateLimited(m)) => Err(ProviderError::RateLimited(m.clone())),
        Err(ProviderError::Transient(m)) => Err(ProviderError::Transient(m.clone())),
        Err(ProviderError::Permanent(m)) => Err(ProviderError::Permanent(m.clone())),
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn model_id(&self) -> &str {
        "scripted/test-model"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            clone_result(&self.fallback)
        } else {
            script.remove(0)
        }
    }
}

pub fn provider_always(response: &str) -> Box<dyn ModelProvider> {
    Box::new(ScriptedProvider {
        script: Mutex::new(Vec::new()),
        fallback: Ok(response.to_string()),
    })
}

pub fn provider_always_transient() -> Box<dyn ModelProvider> {
    Box::new(ScriptedProvider {
        script: Mutex::new(Vec::new()),
        fallback: Err(ProviderError::RateLimited("scripted 429".into())),
    })
}

pub fn provider_sequence(script: Vec<Result<String, ProviderError>>) -> Box<dyn ModelProvider> {
    Box::new(ScriptedProvider {
        script: Mutex::new(script),
        fallback: Err(ProviderError::Permanent("script exhausted".into())),
    })
}

struct ScriptedAnalyzer {
    result: Result<String, String>,
}

impl Analyzer for ScriptedAnalyzer {
    fn analyze(&self, _paths: &[PathBuf]) -> anyhow::Result<String> {
        match &self.result {
            Ok(summary) => Ok(summary.clone()),
            Err(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }
}

pub fn failing_analyzer() -> Box<dyn Analyzer> {
    Box::new(ScriptedAnalyzer {
        result: Err("pylint is not installed".into()),
    })
}

struct ScriptedRunner {
    exit_code: Option<i32>,
    output: String,
    launch_fails: bool,
}

impl TestRunner for ScriptedRunner {
    fn run(&self, _target: &Path) -> anyhow::Result<RawTestResult> {
        if self.launch_fails {
            anyhow::bail!("pytest not found");
        }
        Ok(RawTestResult {
            exit_code: self.exit_code,
            output: self.output.clone(),
        })
    }
}

pub fn runner_with_exit(exit_code: i32, output: &str) -> Box<dyn TestRunner> {
    Box::new(ScriptedRunner {
        exit_code: Some(exit_code),
        output: output.to_string(),
        launch_fails: false,
    })
}

pub fn failing_runner() -> Box<dyn TestRunner> {
    Box::new(ScriptedRunner {
        exit_code: None,
        output: String::new(),
        launch_fails: true,
    })
}

struct ScriptedValidator {
    /// Reject content containing this substring; empty rejects everything.
    reject_containing: Option<String>,
}

impl SourceValidator for ScriptedValidator {
    fn is_valid(&self, source: &str) -> bool {
        match &self.reject_containing {
            Some(needle) if needle.is_empty() => false,
            Some(needle) => !source.contains(needle.as_str()),
            None => true,
        }
    }
}

pub fn rejecting_validator() -> Box<dyn SourceValidator> {
    Box::new(ScriptedValidator {
        reject_containing: Some(String::new()),
    })
}

pub fn validator_rejecting(needle: &str) -> Box<dyn SourceValidator> {
    Box::new(ScriptedValidator {
        reject_containing: Some(needle.to_string()),
    })
}

/// Fresh tempdir workspace with well-behaved scripted collaborators.
/// Tests swap individual fields to script failures.
pub fn collaborators() -> (tempfile::TempDir, Collaborators) {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path()).unwrap();
    let collab = Collaborators {
        provider: provider_always("def generated():\n    return 1\n"),
        analyzer: Box::new(ScriptedAnalyzer {
            result: Ok("score 4.00/10\ncalc.py:1:0: C0114: Missing module docstring".into()),
        }),
        runner: runner_with_exit(0, "1 passed in 0.01s"),
        validator: Box::new(ScriptedValidator {
            reject_containing: None,
        }),
        workspace,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        temperature: 0.0,
        max_tokens: 1000,
        audit_sample: 5,
    };
    (dir, collab)
}

pub fn write_module(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
