//! The three cooperating roles and the collaborator bundle they call into.
//!
//! Each role is a function taking the shared state for the duration of one
//! synchronous step. Roles mutate the state (trace, queue, next role) and
//! hand control back to the router.

pub mod auditor;
pub mod fixer;
pub mod judge;

use crate::analyzer::Analyzer;
use crate::backoff::RetryPolicy;
use crate::provider::ModelProvider;
use crate::test_runner::TestRunner;
use crate::testgen::SourceValidator;
use crate::workspace::Workspace;

/// External collaborators and the knobs the roles need.
///
/// Trait objects keep the seams mockable: tests script the provider,
/// analyzer, runner, and validator while using a real tempdir workspace.
pub struct Collaborators {
    pub provider: Box<dyn ModelProvider>,
    pub analyzer: Box<dyn Analyzer>,
    pub runner: Box<dyn TestRunner>,
    pub validator: Box<dyn SourceValidator>,
    pub workspace: Workspace,
    pub retry: RetryPolicy,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Bounded prefix of files the Auditor inspects.
    pub audit_sample: usize,
}
