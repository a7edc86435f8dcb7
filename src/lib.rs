//! Orchestration loop that repairs a Python target until its tests pass.
//!
//! Three cooperating roles share one owned state record:
//! - the Auditor summarizes defects via static analysis,
//! - the Fixer rewrites one file at a time through a model provider and
//!   repairs its companion tests,
//! - the Judge runs the test suite and decides what happens next.
//!
//! A plain bounded loop ([`router`]) drives the roles; nothing advances the
//! run except an explicit routing decision, and every run terminates with a
//! [`state::StopReason`].

pub mod agents;
pub mod analyzer;
pub mod backoff;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod router;
pub mod run_log;
pub mod state;
pub mod test_runner;
pub mod testgen;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

pub use agents::Collaborators;
pub use config::SwarmConfig;
pub use orchestrator::{Orchestrator, RunReport};
pub use state::{Role, RunState, StopReason};
