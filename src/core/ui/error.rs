//=========================================================================
// UI Manager Errors
//=========================================================================

use thiserror::Error;

use super::descriptor::UiId;

/// Errors returned by [`super::UiManager`] requests.
///
/// Load and instantiation failures are absorbed by the manager (logged,
/// assets balanced) and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UiError {
    #[error("UI id {0} has no descriptor")]
    UnknownUi(UiId),

    #[error("UI id {0} is not registered as a tip")]
    UnknownTips(UiId),
}
