//=========================================================================
// State Behaviours
//=========================================================================
//
// Optional objects attached to individual states.
//
// A behaviour can veto entering or leaving its state and receives
// enter / leave / per-frame update callbacks. Vetoes are checked before
// any lifecycle hook of the transition runs.
//
//=========================================================================

/// Per-state object driven by a [`super::StateMachine`].
///
/// Every method has a default, so implementors only override what they
/// need.
pub trait StateBehaviour {
    /// Whether the machine may enter this state coming from `from`.
    fn can_enter(&self, _from: &str) -> bool {
        true
    }

    /// Whether the machine may leave this state towards `to`.
    fn can_leave(&self, _to: &str) -> bool {
        true
    }

    /// Called when the state becomes current.
    fn on_enter(&mut self, _from: &str) {}

    /// Called when the state stops being current.
    fn on_leave(&mut self, _to: &str) {}

    /// Called once per frame while the state is current.
    fn update(&mut self, _dt: f32) {}
}
