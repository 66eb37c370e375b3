//=========================================================================
// Transition Definitions
//=========================================================================
//
// Named edges of a state machine.
//
//   TransitionDef::new("melt").from("solid").to("liquid")
//   TransitionDef::new("reset").from_any().to("idle")
//   TransitionDef::new("route").from("start").to_computed(|args| ...)
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::rc::Rc;

//=== Internal Dependencies ===============================================

use super::deferred::Deferred;
use crate::core::value::ArgValue;

/// Wildcard source state.
pub const ANY_STATE: &str = "*";

//=== Source ==============================================================

/// States a transition may fire from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Any current state, including states registered later.
    Any,
    /// One of the listed states.
    States(Vec<String>),
}

//=== Target ==============================================================

/// Function computing a destination from the `fire` arguments.
pub type TargetFn = dyn Fn(&[ArgValue]) -> Destination;

/// Where a transition leads.
#[derive(Clone)]
pub enum Target {
    /// A fixed state.
    State(String),
    /// Wildcard target: stay in the current state.
    Current,
    /// Evaluated at fire time.
    Computed(Rc<TargetFn>),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(state) => f.debug_tuple("State").field(state).finish(),
            Self::Current => f.write_str("Current"),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Result of a computed target.
#[derive(Debug)]
pub enum Destination {
    State(String),
    /// Resolution gates the transition until the deferred settles.
    Defer(Deferred<String>),
}

impl From<&str> for Destination {
    fn from(state: &str) -> Self {
        Self::State(state.to_string())
    }
}

impl From<String> for Destination {
    fn from(state: String) -> Self {
        Self::State(state)
    }
}

//=== TransitionDef =======================================================

/// Declarative description of one named transition.
#[derive(Debug, Clone)]
pub struct TransitionDef {
    pub(super) name: String,
    pub(super) source: Source,
    pub(super) target: Target,
}

impl TransitionDef {
    /// Creates a transition firing from any state and staying put.
    ///
    /// Chain [`from`](Self::from) and [`to`](Self::to) to narrow it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: Source::Any,
            target: Target::Current,
        }
    }

    /// Adds a source state. The first call replaces the default wildcard.
    pub fn from(mut self, state: impl Into<String>) -> Self {
        let state = state.into();
        if state == ANY_STATE {
            self.source = Source::Any;
            return self;
        }
        match &mut self.source {
            Source::States(states) => states.push(state),
            Source::Any => self.source = Source::States(vec![state]),
        }
        self
    }

    /// Allows the transition from any state.
    pub fn from_any(mut self) -> Self {
        self.source = Source::Any;
        self
    }

    /// Sets a fixed destination. `"*"` means stay in the current state.
    pub fn to(mut self, state: impl Into<String>) -> Self {
        let state = state.into();
        self.target = if state == ANY_STATE {
            Target::Current
        } else {
            Target::State(state)
        };
        self
    }

    /// Sets a destination computed from the `fire` arguments.
    pub fn to_computed<F>(mut self, compute: F) -> Self
    where
        F: Fn(&[ArgValue]) -> Destination + 'static,
    {
        self.target = Target::Computed(Rc::new(compute));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Returns the first empty name this definition references, if any.
    pub(super) fn empty_name(&self) -> Option<&'static str> {
        if self.name.is_empty() {
            return Some("transition");
        }
        if let Source::States(states) = &self.source {
            if states.iter().any(String::is_empty) {
                return Some("source state");
            }
        }
        if matches!(&self.target, Target::State(state) if state.is_empty()) {
            return Some("target state");
        }
        None
    }
}

//=========================================================================
// Tests
//=========================================================================
