//! Auditor role: bounded-sample static analysis of the target.
//!
//! Reads at most `audit_sample` files, appends the defect summary to the
//! trace, and hands control to the Fixer. An analysis failure is logged and
//! skipped; the loop never stalls on a lint failure. The queue and the
//! current slot are never touched here.

use std::path::PathBuf;

use tracing::warn;

use super::Collaborators;
use crate::analyzer::audit_sample;
use crate::state::{Role, RunState};

pub fn run(state: &mut RunState, collab: &Collaborators) {
    let files: Vec<PathBuf> = if state.target.is_dir() {
        match collab.workspace.list_sources(&state.target) {
            Ok(all) => audit_sample(&all, collab.audit_sample).to_vec(),
            Err(e) => {
                warn!(error = %e, "target listing failed during audit");
                Vec::new()
            }
        }
    } else {
        vec![state.target.clone()]
    };

    if files.is_empty() {
        state.push_trace(Role::Auditor, "lint_error", "nothing to analyze");
        state.active_role = Role::Fixer;
        return;
    }

    match collab.analyzer.analyze(&files) {
        Ok(summary) => {
            state.push_trace(Role::Auditor, "lint_summary", summary);
        }
        Err(e) => {
            warn!(error = %e, "static analysis failed, continuing to fixer");
            state.push_trace(Role::Auditor, "lint_error", format!("analysis failed: {e}"));
        }
    }

    state.active_role = Role::Fixer;
}
