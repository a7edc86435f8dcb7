//! Fixer role: select a file, obtain a rewrite through the backoff invoker,
//! apply the write policy, and repair the companion test file.
//!
//! Write policy: proposed content only reaches disk after passing the syntax
//! gate, and the prior content is backed up first. A failed write leaves the
//! file untouched and the run continues to the Judge.
//!
//! Test-repair policy, in priority order:
//! (a) no companion test file → model-generated tests, falling back to a
//!     deterministic placeholder when generation fails the syntax gate;
//! (b) prior Judge outcome was a collection error and the existing file is
//!     ours or syntactically invalid → regenerate the import scaffold from
//!     the module's public symbols (deterministic, never free-form);
//! (c) a syntactically valid hand-written test file is never overwritten;
//! (d) malformed generated code is discarded before any write.

use std::path::Path;

use tracing::{info, warn};

use super::Collaborators;
use crate::backoff::{invoke_with_backoff, BackoffError};
use crate::prompts;
use crate::provider::{strip_markdown_fences, CompletionRequest};
use crate::state::{Role, RunState, StopReason};
use crate::test_runner::TestStatus;
use crate::testgen::{
    has_collected_tests, is_generated, placeholder_test_module, scaffold_test_module,
};
use crate::workspace::companion_test_path;

/// Outcome of one provider call made on behalf of the Fixer.
enum ProviderResult {
    Content(String),
    /// Retry budget exhausted; the run must stop with `rate_limited`.
    RateLimited(String),
    /// Permanent failure; skip this product and move on.
    Failed(String),
}

pub async fn run(state: &mut RunState, collab: &Collaborators) {
    let Some(file) = state.select_file() else {
        // The state machine should never dispatch the Fixer with an empty
        // slot and an empty queue. Nothing was fixed or tested on this path,
        // so it must not fall through to the router's success default.
        warn!("fixer dispatched with empty queue and no current file");
        state.push_trace(Role::Fixer, "queue_exhausted", "nothing left to fix");
        state.stop(StopReason::NoProgress);
        return;
    };

    let file_name = file
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());

    let source = match collab.workspace.read(&file) {
        Ok(source) => source,
        Err(e) => {
            warn!(file = %file.display(), error = %e, "fixer could not read target");
            state.push_trace(Role::Fixer, "read_failed", format!("{file_name}: {e}"));
            state.active_role = Role::Judge;
            return;
        }
    };

    // Rewrite the module through the backoff invoker.
    let lint = state
        .last_trace_summary("lint_summary")
        .unwrap_or_default()
        .to_string();
    let request = CompletionRequest {
        system: prompts::FIXER_PREAMBLE.into(),
        prompt: prompts::rewrite_prompt(&file_name, &source, &lint),
        temperature: collab.temperature,
        max_tokens: collab.max_tokens,
    };

    match complete_with_backoff(collab, &request).await {
        ProviderResult::Content(response) => {
            let candidate = strip_markdown_fences(&response);
            if collab.validator.is_valid(&candidate) {
                match collab.workspace.write(&file, &candidate, true) {
                    Ok(()) => {
                        info!(file = %file_name, bytes = candidate.len(), "rewrite applied");
                        state.push_trace(
                            Role::Fixer,
                            "rewrite",
                            format!("rewrote {file_name} ({} bytes)", candidate.len()),
                        );
                    }
                    Err(e) => {
                        // Prior content is preserved; continue to the Judge.
                        warn!(file = %file_name, error = %e, "rewrite write failed");
                        state.push_trace(Role::Fixer, "write_failed", format!("{file_name}: {e}"));
                    }
                }
            } else {
                state.push_trace(
                    Role::Fixer,
                    "rewrite_discarded",
                    format!("{file_name}: generated source failed the syntax check"),
                );
            }
        }
        ProviderResult::RateLimited(detail) => {
            state.push_trace(Role::Fixer, "rate_limited", detail);
            state.stop(StopReason::RateLimited);
            return;
        }
        ProviderResult::Failed(detail) => {
            state.push_trace(Role::Fixer, "provider_error", detail);
        }
    }

    repair_tests(state, collab, &file).await;
    if state.stop_reason.is_some() {
        return;
    }

    state.active_role = Role::Judge;
}

async fn complete_with_backoff(
    collab: &Collaborators,
    request: &CompletionRequest,
) -> ProviderResult {
    match invoke_with_backoff(&collab.retry, || collab.provider.complete(request)).await {
        Ok(content) => ProviderResult::Content(content),
        Err(BackoffError::RateLimitExceeded {
            attempts,
            last_error,
        }) => ProviderResult::RateLimited(format!(
            "provider rate-limited after {attempts} attempts: {last_error}"
        )),
        Err(BackoffError::Permanent(e)) => ProviderResult::Failed(e.to_string()),
    }
}

/// Apply the test-repair policy to `module`'s companion test file.
async fn repair_tests(state: &mut RunState, collab: &Collaborators, module: &Path) {
    let test_path = companion_test_path(module);
    let test_name = test_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let existing = collab.workspace.read(&test_path).ok();

    match existing {
        None => {
            // (a) No companion test file. Prefer model-generated tests; fall
            // back to the deterministic placeholder when the generation is
            // malformed or the provider fails permanently.
            let module_source = collab.workspace.read(module).unwrap_or_default();
            let request = CompletionRequest {
                system: prompts::TESTGEN_PREAMBLE.into(),
                prompt: prompts::testgen_prompt(&test_name, &module_source),
                temperature: collab.temperature,
                max_tokens: collab.max_tokens,
            };
            let content = match complete_with_backoff(collab, &request).await {
                ProviderResult::Content(response) => {
                    let candidate = strip_markdown_fences(&response);
                    if collab.validator.is_valid(&candidate) && has_collected_tests(&candidate) {
                        format!("{}\n{candidate}", crate::testgen::GENERATED_MARKER)
                    } else {
                        // (d) malformed generation is discarded, never written.
                        state.push_trace(
                            Role::Fixer,
                            "testgen_discarded",
                            format!("{test_name}: generated tests failed validation"),
                        );
                        placeholder_test_module(module)
                    }
                }
                ProviderResult::RateLimited(detail) => {
                    state.push_trace(Role::Fixer, "rate_limited", detail);
                    state.stop(StopReason::RateLimited);
                    return;
                }
                ProviderResult::Failed(detail) => {
                    state.push_trace(Role::Fixer, "testgen_failed", detail);
                    placeholder_test_module(module)
                }
            };
            write_test_file(state, collab, &test_path, &test_name, &content, "test_bootstrap");
        }
        Some(existing) => {
            let valid = collab.validator.is_valid(&existing);
            let ours = is_generated(&existing);

            if valid && !ours {
                // (c) Hand-written and syntactically valid: never overwritten.
                return;
            }

            let collection_error = state.last_outcome == Some(TestStatus::CollectionError);
            if collection_error || !valid {
                // (b) Regenerate the scaffold from the module's real symbols.
                let module_source = collab.workspace.read(module).unwrap_or_default();
                let scaffold = scaffold_test_module(module, &module_source);
                write_test_file(state, collab, &test_path, &test_name, &scaffold, "test_scaffold");
            } else if !has_collected_tests(&existing) {
                // (a) Our own file collects nothing: replace with a placeholder.
                let placeholder = placeholder_test_module(module);
                write_test_file(
                    state,
                    collab,
                    &test_path,
                    &test_name,
                    &placeholder,
                    "test_bootstrap",
                );
            }
        }
    }
}

fn write_test_file(
    state: &mut RunState,
    collab: &Collaborators,
    test_path: &Path,
    test_name: &str,
    content: &str,
    action: &str,
) {
    match collab.workspace.write(test_path, content, true) {
        Ok(()) => {
            state.push_trace(Role::Fixer, action, format!("wrote {test_name}"));
        }
        Err(e) => {
            warn!(file = %test_name, error = %e, "test file write failed");
            state.push_trace(Role::Fixer, "write_failed", format!("{test_name}: {e}"));
        }
    }
}
