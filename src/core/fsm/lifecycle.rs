//=========================================================================
// Lifecycle Hooks
//=========================================================================
//
// Hook naming convention, hook handler signature and hook results.
//
// Every transition runs a fixed pipeline of hooks. Handlers are looked up
// by hook name, and names are derived from state / transition names:
//
//   generic     onBeforeTransition  onLeaveState  onTransition
//               onEnterState        onAfterTransition
//   transition  onBefore<T>  onAfter<T>  on<T>
//   state       onLeave<S>   onEnter<S>  on<S>
//
// `<X>` is the camel-cased name: "step-one" → "StepOne".
//
//=========================================================================

//=== Internal Dependencies ===============================================

use super::deferred::Deferred;
use crate::core::value::ArgValue;

//=== Hook ================================================================

/// A lifecycle hook, convertible to its canonical handler name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook<'a> {
    BeforeTransition,
    LeaveState,
    Transition,
    EnterState,
    AfterTransition,
    /// `onBefore<T>` for a transition.
    Before(&'a str),
    /// `onAfter<T>` for a transition.
    After(&'a str),
    /// `onLeave<S>` for a state.
    Leave(&'a str),
    /// `onEnter<S>` for a state.
    Enter(&'a str),
    /// `on<X>`: entered state, or completed transition.
    On(&'a str),
}

impl Hook<'_> {
    /// Returns the handler name for this hook.
    pub fn name(&self) -> String {
        match self {
            Self::BeforeTransition => "onBeforeTransition".to_string(),
            Self::LeaveState => "onLeaveState".to_string(),
            Self::Transition => "onTransition".to_string(),
            Self::EnterState => "onEnterState".to_string(),
            Self::AfterTransition => "onAfterTransition".to_string(),
            Self::Before(name) => format!("onBefore{}", camelize(name)),
            Self::After(name) => format!("onAfter{}", camelize(name)),
            Self::Leave(name) => format!("onLeave{}", camelize(name)),
            Self::Enter(name) => format!("onEnter{}", camelize(name)),
            Self::On(name) => format!("on{}", camelize(name)),
        }
    }
}

/// Hook names generated for a state.
pub(super) fn state_hook_names(state: &str) -> [String; 3] {
    [
        Hook::Leave(state).name(),
        Hook::Enter(state).name(),
        Hook::On(state).name(),
    ]
}

/// Hook names generated for a transition.
pub(super) fn transition_hook_names(transition: &str) -> [String; 3] {
    [
        Hook::Before(transition).name(),
        Hook::After(transition).name(),
        Hook::On(transition).name(),
    ]
}

/// Upper-cases the first letter of every word and drops separators.
fn camelize(name: &str) -> String {
    name.split(|c| c == '-' || c == '_' || c == ' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

//=== Handler API =========================================================

/// Context handed to every hook handler.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle<'a> {
    /// Name of the transition being fired.
    pub transition: &'a str,
    /// State the machine was in when the transition fired.
    pub from: &'a str,
    /// Resolved destination state.
    pub to: &'a str,
    /// Name of the hook being evaluated.
    pub hook: &'a str,
    /// Arguments passed to `fire`.
    pub args: &'a [ArgValue],
}

/// Outcome of a hook handler.
#[derive(Debug)]
pub enum HookResult {
    /// Proceed with the next pipeline step.
    Continue,
    /// Stop the transition without error.
    Cancel,
    /// Stop the transition and report a failure to the caller.
    Fail(String),
    /// Suspend the pipeline until the deferred settles.
    ///
    /// `Ok(true)` continues, `Ok(false)` cancels, `Err` fails.
    Defer(Deferred<bool>),
}

impl From<()> for HookResult {
    fn from(_: ()) -> Self {
        Self::Continue
    }
}

impl From<bool> for HookResult {
    fn from(proceed: bool) -> Self {
        if proceed {
            Self::Continue
        } else {
            Self::Cancel
        }
    }
}

impl From<Deferred<bool>> for HookResult {
    fn from(deferred: Deferred<bool>) -> Self {
        Self::Defer(deferred)
    }
}

/// Boxed hook handler.
pub type HookFn = Box<dyn FnMut(&Lifecycle<'_>) -> HookResult>;

//=========================================================================
// Tests
//=========================================================================
