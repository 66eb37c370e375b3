//=========================================================================
// State Machine Errors
//=========================================================================

use thiserror::Error;

/// Errors surfaced by [`super::StateMachine`].
///
/// Invalid and pending transitions are not errors; they are reported
/// through the machine's rejection handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsmError {
    #[error("empty {0} name")]
    EmptyName(&'static str),

    #[error("hook '{hook}' failed during '{transition}': {reason}")]
    HookFailed {
        transition: String,
        hook: String,
        reason: String,
    },

    #[error("destination of '{transition}' failed to resolve: {reason}")]
    DestinationFailed { transition: String, reason: String },
}
