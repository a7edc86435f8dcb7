//! Routing between roles and the two stop conditions.
//!
//! The router is the only place that increments `iteration_count` and the
//! only place that declares termination. The ceiling check runs before the
//! `Done` check so that a success arriving exactly on the boundary iteration
//! still terminates, never an off-by-one past `max_iterations`.

use crate::state::{Role, RunState, StopReason};

/// What the loop driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Dispatch this role; the iteration counter has been incremented.
    Run(Role),
    /// Stop. The state's `stop_reason` carries the reason.
    Terminal(StopReason),
}

/// Decide the next step from the current state.
pub fn route(state: &mut RunState) -> Step {
    if state.iteration_count >= state.max_iterations {
        state.stop(StopReason::ExhaustedIterations);
        // stop() keeps an earlier reason if one was already set.
        return Step::Terminal(state.stop_reason.unwrap_or(StopReason::ExhaustedIterations));
    }

    if state.active_role == Role::Done {
        // A role that reaches Done through the success path may leave the
        // reason unset; default it here.
        if state.stop_reason.is_none() {
            state.stop_reason = Some(StopReason::TestsPassing);
        }
        return Step::Terminal(state.stop_reason.unwrap_or(StopReason::TestsPassing));
    }

    state.iteration_count += 1;
    tracing::debug!(role = %state.active_role, iteration = state.iteration_count, "dispatch");
    Step::Run(state.active_role)
}
