//=========================================================================
// State Machine
//=========================================================================
//
// Transition engine with lifecycle hooks and deferred steps.
//
// Architecture:
//   StateMachine
//     ├─ transitions: HashMap<from, HashMap<name, Target>>   ("*" = any)
//     ├─ handlers:    HashMap<hook name, HookFn>
//     ├─ behaviours:  HashMap<state, Box<dyn StateBehaviour>>
//     └─ running:     Option<Run>                             (pending)
//
// Flow:
//   fire() → resolve target → build pipeline → drive()
//                                               │
//              Suspended ◄── hook deferred ─────┤
//              poll() ─────► drive() again ─────┘
//
// A machine accepts one transition at a time. While a pipeline is in
// flight, `fire` is rejected through the pending handler; it is never
// queued.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use log::{debug, error, warn};

//=== Internal Dependencies ===============================================

use super::behaviour::StateBehaviour;
use super::deferred::{Deferred, Settlement};
use super::error::FsmError;
use super::lifecycle::{state_hook_names, transition_hook_names, Hook, HookFn, HookResult, Lifecycle};
use super::transition::{Destination, Source, Target, TransitionDef, ANY_STATE};
use crate::core::value::ArgValue;

/// State of a machine before its initial transition fires.
pub const NONE_STATE: &str = "none";

/// Name of the implicit initial transition.
pub const INIT_TRANSITION: &str = "init";

//=== Public Types ========================================================

/// Why a transition was refused without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No transition of that name leaves the current state.
    Invalid,
    /// Another transition is still in flight.
    Pending,
}

/// Outcome of [`StateMachine::fire`] and [`StateMachine::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    /// Every pipeline step ran.
    Completed,
    /// A hook or state behaviour cancelled the transition.
    Cancelled,
    /// Waiting on a deferred; call [`StateMachine::poll`] to resume.
    Suspended,
    /// Refused before any step ran.
    Rejected(Rejection),
}

impl Fired {
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

/// Callback for invalid or pending transitions: `(transition, current state)`.
pub type RejectionFn = Box<dyn FnMut(&str, &str)>;

//=== MachineConfig =======================================================

/// Everything [`StateMachine::configure`] installs.
#[derive(Default)]
pub struct MachineConfig {
    init: Option<String>,
    transitions: Vec<TransitionDef>,
    handlers: Vec<(String, HookFn)>,
}

impl MachineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the state entered by the implicit `init` transition.
    pub fn init(mut self, state: impl Into<String>) -> Self {
        self.init = Some(state.into());
        self
    }

    pub fn transition(mut self, def: TransitionDef) -> Self {
        self.transitions.push(def);
        self
    }

    /// Installs a handler for a lifecycle hook.
    pub fn on<F, R>(self, hook: Hook<'_>, handler: F) -> Self
    where
        F: FnMut(&Lifecycle<'_>) -> R + 'static,
        R: Into<HookResult>,
    {
        let name = hook.name();
        self.on_named(name, handler)
    }

    /// Installs a handler under an explicit hook name.
    pub fn on_named<F, R>(mut self, name: impl Into<String>, mut handler: F) -> Self
    where
        F: FnMut(&Lifecycle<'_>) -> R + 'static,
        R: Into<HookResult>,
    {
        self.handlers
            .push((name.into(), Box::new(move |lifecycle| handler(lifecycle).into())));
        self
    }
}

impl fmt::Debug for MachineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineConfig")
            .field("init", &self.init)
            .field("transitions", &self.transitions)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

//=== Internal Types ======================================================

#[derive(Debug)]
enum Step {
    Guard,
    Hook(String),
    Mutate,
}

#[derive(Debug)]
enum Waiting {
    Destination(Deferred<String>),
    Hook { hook: String, deferred: Deferred<bool> },
}

/// A transition in flight.
#[derive(Debug)]
struct Run {
    transition: String,
    from: String,
    to: Option<String>,
    args: Vec<ArgValue>,
    steps: VecDeque<Step>,
    waiting: Option<Waiting>,
}

//=== StateMachine ========================================================

/// Named-transition state machine with a lifecycle hook pipeline.
pub struct StateMachine {
    name: String,
    current: String,
    states: BTreeSet<String>,
    transitions: HashMap<String, HashMap<String, Target>>,
    transition_names: BTreeSet<String>,
    hook_table: BTreeMap<String, BTreeSet<String>>,
    handlers: HashMap<String, HookFn>,
    behaviours: HashMap<String, Box<dyn StateBehaviour>>,
    running: Option<Run>,
    invalid_handler: RejectionFn,
    pending_handler: RejectionFn,
}

impl StateMachine {
    //--- Construction -----------------------------------------------------

    /// Creates an unconfigured machine in the `none` state.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let invalid_name = name.clone();
        let pending_name = name.clone();

        let mut machine = Self {
            name,
            current: NONE_STATE.to_string(),
            states: BTreeSet::new(),
            transitions: HashMap::new(),
            transition_names: BTreeSet::new(),
            hook_table: BTreeMap::new(),
            handlers: HashMap::new(),
            behaviours: HashMap::new(),
            running: None,
            invalid_handler: Box::new(move |transition, state| {
                warn!(
                    "[{}] transition '{}' is invalid in state '{}'",
                    invalid_name, transition, state
                );
            }),
            pending_handler: Box::new(move |transition, state| {
                warn!(
                    "[{}] transition '{}' rejected: a transition is pending in state '{}'",
                    pending_name, transition, state
                );
            }),
        };
        machine.register_state(NONE_STATE);
        machine
    }

    //--- Configuration ----------------------------------------------------

    /// Resets the machine and installs `config`.
    ///
    /// Fires the implicit `init` transition when an initial state is
    /// configured; the returned value is that transition's outcome.
    /// Without an initial state, returns `Fired::Completed`.
    ///
    /// Attached state behaviours survive reconfiguration, and so do their
    /// states.
    pub fn configure(&mut self, config: MachineConfig) -> Result<Fired, FsmError> {
        if let Some(what) = Self::validate(&config) {
            error!("[{}] configure aborted: empty {} name", self.name, what);
            return Err(FsmError::EmptyName(what));
        }

        self.current = NONE_STATE.to_string();
        self.states.clear();
        self.transitions.clear();
        self.transition_names.clear();
        self.hook_table.clear();
        self.handlers.clear();
        self.running = None;
        self.register_state(NONE_STATE);
        let attached: Vec<String> = self.behaviours.keys().cloned().collect();
        for state in &attached {
            self.register_state(state);
        }

        let MachineConfig {
            init,
            transitions,
            handlers,
        } = config;

        if let Some(initial) = &init {
            self.register(
                TransitionDef::new(INIT_TRANSITION)
                    .from(NONE_STATE)
                    .to(initial.as_str()),
            );
        }
        for def in transitions {
            self.register(def);
        }
        for (hook, handler) in handlers {
            self.handlers.insert(hook, handler);
        }

        debug!(
            "[{}] configured with {} state(s), {} transition(s)",
            self.name,
            self.states.len(),
            self.transition_names.len()
        );

        match init {
            Some(_) => self.fire(INIT_TRANSITION, Vec::new()),
            None => Ok(Fired::Completed),
        }
    }

    /// Registers one more transition on a configured machine.
    pub fn add_transition(&mut self, def: TransitionDef) -> Result<(), FsmError> {
        if let Some(what) = def.empty_name() {
            error!("[{}] add_transition aborted: empty {} name", self.name, what);
            return Err(FsmError::EmptyName(what));
        }
        self.register(def);
        Ok(())
    }

    /// Installs or replaces a single hook handler.
    pub fn on<F, R>(&mut self, hook: Hook<'_>, mut handler: F)
    where
        F: FnMut(&Lifecycle<'_>) -> R + 'static,
        R: Into<HookResult>,
    {
        self.handlers
            .insert(hook.name(), Box::new(move |lifecycle| handler(lifecycle).into()));
    }

    /// Attaches a behaviour object to `state`, replacing any previous one.
    pub fn attach_behaviour(
        &mut self,
        state: impl Into<String>,
        behaviour: Box<dyn StateBehaviour>,
    ) -> Result<(), FsmError> {
        let state = state.into();
        if state.is_empty() {
            error!("[{}] attach_behaviour aborted: empty state name", self.name);
            return Err(FsmError::EmptyName("state"));
        }
        self.register_state(&state);
        self.behaviours.insert(state, behaviour);
        Ok(())
    }

    /// Detaches and returns the behaviour of `state`.
    pub fn detach_behaviour(&mut self, state: &str) -> Option<Box<dyn StateBehaviour>> {
        self.behaviours.remove(state)
    }

    /// Overrides how invalid transitions are reported.
    pub fn set_invalid_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str, &str) + 'static,
    {
        self.invalid_handler = Box::new(handler);
    }

    /// Overrides how transitions fired while pending are reported.
    pub fn set_pending_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str, &str) + 'static,
    {
        self.pending_handler = Box::new(handler);
    }

    //--- Firing -----------------------------------------------------------

    /// Returns true if `transition` may fire now.
    pub fn can(&self, transition: &str) -> bool {
        self.running.is_none() && self.lookup(transition).is_some()
    }

    /// Fires `transition` with `args`.
    ///
    /// Hook failures clear the pending flag and are returned as `Err`.
    pub fn fire(&mut self, transition: &str, args: Vec<ArgValue>) -> Result<Fired, FsmError> {
        if self.running.is_some() {
            (self.pending_handler)(transition, &self.current);
            return Ok(Fired::Rejected(Rejection::Pending));
        }

        let Some(target) = self.lookup(transition).cloned() else {
            (self.invalid_handler)(transition, &self.current);
            return Ok(Fired::Rejected(Rejection::Invalid));
        };

        debug!("[{}] firing '{}' from '{}'", self.name, transition, self.current);

        let mut run = Run {
            transition: transition.to_string(),
            from: self.current.clone(),
            to: None,
            args,
            steps: VecDeque::new(),
            waiting: None,
        };

        match target {
            Target::State(state) => self.set_destination(&mut run, state),
            Target::Current => {
                let state = run.from.clone();
                self.set_destination(&mut run, state);
            }
            Target::Computed(compute) => match compute(&run.args) {
                Destination::State(state) => {
                    if state.is_empty() {
                        (self.invalid_handler)(transition, &self.current);
                        return Ok(Fired::Rejected(Rejection::Invalid));
                    }
                    self.set_destination(&mut run, state);
                }
                Destination::Defer(deferred) => {
                    run.waiting = Some(Waiting::Destination(deferred));
                }
            },
        }

        self.running = Some(run);
        self.drive()
    }

    /// Resumes a suspended transition.
    ///
    /// Returns `None` when no transition is in flight.
    pub fn poll(&mut self) -> Option<Result<Fired, FsmError>> {
        if self.running.is_none() {
            return None;
        }
        Some(self.drive())
    }

    /// Forwards a frame update to the current state's behaviour.
    pub fn update(&mut self, dt: f32) {
        if let Some(behaviour) = self.behaviours.get_mut(&self.current) {
            behaviour.update(dt);
        }
    }

    //--- Query API --------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state.
    pub fn state(&self) -> &str {
        &self.current
    }

    /// Returns true if the current state is `state`.
    pub fn is(&self, state: &str) -> bool {
        self.current == state
    }

    /// Returns true while a transition is in flight.
    pub fn is_pending(&self) -> bool {
        self.running.is_some()
    }

    /// Transitions that may fire from the current state, sorted by name.
    pub fn transitions(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for key in [self.current.as_str(), ANY_STATE] {
            if let Some(edges) = self.transitions.get(key) {
                names.extend(edges.keys().cloned());
            }
        }
        names.into_iter().collect()
    }

    /// Every registered state, sorted, including `none`.
    pub fn all_states(&self) -> Vec<String> {
        self.states.iter().cloned().collect()
    }

    /// Every registered transition name, sorted.
    pub fn all_transitions(&self) -> Vec<String> {
        self.transition_names.iter().cloned().collect()
    }

    /// Hook names generated for a state or transition called `name`.
    pub fn hook_names(&self, name: &str) -> Vec<String> {
        self.hook_table
            .get(name)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    //--- Internal Helpers -------------------------------------------------

    fn validate(config: &MachineConfig) -> Option<&'static str> {
        if matches!(&config.init, Some(state) if state.is_empty()) {
            return Some("initial state");
        }
        if config.handlers.iter().any(|(hook, _)| hook.is_empty()) {
            return Some("hook");
        }
        config.transitions.iter().find_map(TransitionDef::empty_name)
    }

    fn register(&mut self, def: TransitionDef) {
        let TransitionDef {
            name,
            source,
            target,
        } = def;

        let sources = match source {
            Source::Any => vec![ANY_STATE.to_string()],
            Source::States(states) => states,
        };

        for from in sources {
            if from != ANY_STATE {
                self.register_state(&from);
            }
            self.transitions
                .entry(from)
                .or_default()
                .insert(name.clone(), target.clone());
        }

        if let Target::State(state) = &target {
            self.register_state(state);
        }

        self.hook_table
            .entry(name.clone())
            .or_default()
            .extend(transition_hook_names(&name));
        self.transition_names.insert(name);
    }

    fn register_state(&mut self, state: &str) {
        if self.states.insert(state.to_string()) {
            self.hook_table
                .entry(state.to_string())
                .or_default()
                .extend(state_hook_names(state));
        }
    }

    fn lookup(&self, transition: &str) -> Option<&Target> {
        self.transitions
            .get(&self.current)
            .and_then(|edges| edges.get(transition))
            .or_else(|| {
                self.transitions
                    .get(ANY_STATE)
                    .and_then(|edges| edges.get(transition))
            })
    }

    fn set_destination(&mut self, run: &mut Run, to: String) {
        self.register_state(&to);
        run.steps = Self::pipeline(&run.transition, &run.from, &to);
        run.to = Some(to);
    }

    fn pipeline(transition: &str, from: &str, to: &str) -> VecDeque<Step> {
        let changed = from != to;
        let mut steps = VecDeque::with_capacity(13);

        if changed {
            steps.push_back(Step::Guard);
        }
        steps.push_back(Step::Hook(Hook::BeforeTransition.name()));
        steps.push_back(Step::Hook(Hook::Before(transition).name()));
        if changed {
            steps.push_back(Step::Hook(Hook::LeaveState.name()));
            steps.push_back(Step::Hook(Hook::Leave(from).name()));
        }
        steps.push_back(Step::Hook(Hook::Transition.name()));
        if changed {
            steps.push_back(Step::Mutate);
            steps.push_back(Step::Hook(Hook::EnterState.name()));
            steps.push_back(Step::Hook(Hook::Enter(to).name()));
            steps.push_back(Step::Hook(Hook::On(to).name()));
        }
        steps.push_back(Step::Hook(Hook::AfterTransition.name()));
        steps.push_back(Step::Hook(Hook::After(transition).name()));
        steps.push_back(Step::Hook(Hook::On(transition).name()));

        steps
    }

    /// Runs pipeline steps until completion, cancellation, failure or a
    /// deferred that has not settled yet.
    ///
    /// `running` is taken for the duration; every early return drops it,
    /// which clears the pending flag.
    fn drive(&mut self) -> Result<Fired, FsmError> {
        let Some(mut run) = self.running.take() else {
            return Ok(Fired::Completed);
        };

        loop {
            if let Some(waiting) = run.waiting.take() {
                match waiting {
                    Waiting::Destination(deferred) => match deferred.try_settle() {
                        Settlement::Pending => {
                            run.waiting = Some(Waiting::Destination(deferred));
                            self.running = Some(run);
                            return Ok(Fired::Suspended);
                        }
                        Settlement::Ready(Ok(to)) if to.is_empty() => {
                            (self.invalid_handler)(&run.transition, &run.from);
                            return Ok(Fired::Rejected(Rejection::Invalid));
                        }
                        Settlement::Ready(Ok(to)) => self.set_destination(&mut run, to),
                        Settlement::Ready(Err(reason)) => {
                            return Err(FsmError::DestinationFailed {
                                transition: run.transition,
                                reason,
                            });
                        }
                        Settlement::Abandoned => {
                            return Err(FsmError::DestinationFailed {
                                transition: run.transition,
                                reason: "resolver dropped without settling".to_string(),
                            });
                        }
                    },
                    Waiting::Hook { hook, deferred } => match deferred.try_settle() {
                        Settlement::Pending => {
                            run.waiting = Some(Waiting::Hook { hook, deferred });
                            self.running = Some(run);
                            return Ok(Fired::Suspended);
                        }
                        Settlement::Ready(Ok(true)) => {}
                        Settlement::Ready(Ok(false)) => {
                            debug!("[{}] '{}' cancelled by {}", self.name, run.transition, hook);
                            return Ok(Fired::Cancelled);
                        }
                        Settlement::Ready(Err(reason)) => {
                            return Err(FsmError::HookFailed {
                                transition: run.transition,
                                hook,
                                reason,
                            });
                        }
                        Settlement::Abandoned => {
                            return Err(FsmError::HookFailed {
                                transition: run.transition,
                                hook,
                                reason: "resolver dropped without settling".to_string(),
                            });
                        }
                    },
                }
                continue;
            }

            let Some(step) = run.steps.pop_front() else {
                debug!(
                    "[{}] '{}' completed, now in '{}'",
                    self.name, run.transition, self.current
                );
                return Ok(Fired::Completed);
            };

            let to = run.to.clone().unwrap_or_default();
            match step {
                Step::Guard => {
                    if !self.behaviours_allow(&run.from, &to) {
                        debug!(
                            "[{}] '{}' vetoed by state behaviour ({} -> {})",
                            self.name, run.transition, run.from, to
                        );
                        return Ok(Fired::Cancelled);
                    }
                }
                Step::Mutate => self.enter(&run.from, to),
                Step::Hook(hook) => {
                    let Some(handler) = self.handlers.get_mut(&hook) else {
                        continue;
                    };
                    let lifecycle = Lifecycle {
                        transition: &run.transition,
                        from: &run.from,
                        to: &to,
                        hook: &hook,
                        args: &run.args,
                    };
                    match handler(&lifecycle) {
                        HookResult::Continue => {}
                        HookResult::Cancel => {
                            debug!("[{}] '{}' cancelled by {}", self.name, run.transition, hook);
                            return Ok(Fired::Cancelled);
                        }
                        HookResult::Fail(reason) => {
                            return Err(FsmError::HookFailed {
                                transition: run.transition,
                                hook,
                                reason,
                            });
                        }
                        HookResult::Defer(deferred) => {
                            run.waiting = Some(Waiting::Hook { hook, deferred });
                        }
                    }
                }
            }
        }
    }

    fn behaviours_allow(&self, from: &str, to: &str) -> bool {
        let may_leave = self
            .behaviours
            .get(from)
            .map_or(true, |behaviour| behaviour.can_leave(to));
        let may_enter = self
            .behaviours
            .get(to)
            .map_or(true, |behaviour| behaviour.can_enter(from));
        may_leave && may_enter
    }

    fn enter(&mut self, from: &str, to: String) {
        if let Some(behaviour) = self.behaviours.get_mut(from) {
            behaviour.on_leave(&to);
        }
        if let Some(behaviour) = self.behaviours.get_mut(&to) {
            behaviour.on_enter(from);
        }
        self.current = to;
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("current", &self.current)
            .field("states", &self.states)
            .field("transitions", &self.transition_names)
            .field("pending", &self.running.is_some())
            .finish_non_exhaustive()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fsm::deferred::deferred;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn matter() -> MachineConfig {
        MachineConfig::new()
            .init("solid")
            .transition(TransitionDef::new("melt").from("solid").to("liquid"))
            .transition(TransitionDef::new("freeze").from("liquid").to("solid"))
            .transition(TransitionDef::new("vaporize").from("liquid").to("gas"))
            .transition(TransitionDef::new("condense").from("gas").to("liquid"))
    }

    fn configured(config: MachineConfig) -> StateMachine {
        let mut machine = StateMachine::new("test");
        assert_eq!(machine.configure(config), Ok(Fired::Completed));
        machine
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>) -> impl FnMut(&Lifecycle<'_>) + 'static {
        let log = Rc::clone(log);
        move |lifecycle: &Lifecycle<'_>| log.borrow_mut().push(lifecycle.hook.to_string())
    }

    //--- Configuration Tests ---

    #[test]
    fn starts_in_none_state() {
        let machine = StateMachine::new("fresh");
        assert!(machine.is(NONE_STATE));
        assert!(!machine.is_pending());
        assert_eq!(machine.all_states(), vec![NONE_STATE.to_string()]);
    }

    #[test]
    fn configure_fires_init() {
        let machine = configured(matter());
        assert_eq!(machine.state(), "solid");
        assert_eq!(
            machine.all_states(),
            vec!["gas", "liquid", "none", "solid"]
        );
        assert_eq!(
            machine.all_transitions(),
            vec!["condense", "freeze", "init", "melt", "vaporize"]
        );
    }

    #[test]
    fn configure_without_init_stays_none() {
        let machine = configured(
            MachineConfig::new().transition(TransitionDef::new("go").from("a").to("b")),
        );
        assert!(machine.is(NONE_STATE));
        assert!(!machine.can("go"));
    }

    #[test]
    fn empty_names_abort_configuration() {
        let mut machine = configured(matter());

        let result = machine.configure(
            MachineConfig::new()
                .init("idle")
                .transition(TransitionDef::new("").from("idle").to("busy")),
        );

        assert_eq!(result, Err(FsmError::EmptyName("transition")));
        assert_eq!(machine.state(), "solid");
        assert!(machine.can("melt"));
    }

    #[test]
    fn hook_names_are_generated() {
        let machine = configured(matter());
        assert_eq!(
            machine.hook_names("melt"),
            vec!["onAfterMelt", "onBeforeMelt", "onMelt"]
        );
        assert_eq!(
            machine.hook_names("liquid"),
            vec!["onEnterLiquid", "onLeaveLiquid", "onLiquid"]
        );
        assert!(machine.hook_names("plasma").is_empty());
    }

    //--- Firing Tests ---

    #[test]
    fn transitions_follow_edges() {
        let mut machine = configured(matter());

        assert_eq!(machine.transitions(), vec!["melt"]);
        assert_eq!(machine.fire("melt", Vec::new()), Ok(Fired::Completed));
        assert!(machine.is("liquid"));
        assert_eq!(machine.transitions(), vec!["freeze", "vaporize"]);
    }

    #[test]
    fn invalid_transition_uses_handler() {
        let mut machine = configured(matter());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        machine.set_invalid_handler(move |transition, state| {
            sink.borrow_mut().push(format!("{transition}@{state}"));
        });

        assert_eq!(
            machine.fire("freeze", Vec::new()),
            Ok(Fired::Rejected(Rejection::Invalid))
        );
        assert!(machine.is("solid"));
        assert_eq!(*seen.borrow(), vec!["freeze@solid"]);
    }

    #[test]
    fn full_pipeline_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut config = matter();
        for hook in [
            "onBeforeTransition",
            "onBeforeMelt",
            "onLeaveState",
            "onLeaveSolid",
            "onTransition",
            "onEnterState",
            "onEnterLiquid",
            "onLiquid",
            "onAfterTransition",
            "onAfterMelt",
            "onMelt",
        ] {
            config = config.on_named(hook, recorder(&log));
        }
        let mut machine = configured(config);
        log.borrow_mut().clear();

        machine.fire("melt", Vec::new()).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "onBeforeTransition",
                "onBeforeMelt",
                "onLeaveState",
                "onLeaveSolid",
                "onTransition",
                "onEnterState",
                "onEnterLiquid",
                "onLiquid",
                "onAfterTransition",
                "onAfterMelt",
                "onMelt",
            ]
        );
    }

    #[test]
    fn state_is_mutated_between_transition_and_enter_hooks() {
        let observed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&observed);
        let mut machine = configured(matter().on(Hook::Enter("liquid"), move |lifecycle| {
            sink.borrow_mut().push((lifecycle.from.to_string(), lifecycle.to.to_string()));
        }));

        machine.fire("melt", Vec::new()).unwrap();
        assert_eq!(*observed.borrow(), vec![("solid".to_string(), "liquid".to_string())]);
    }

    #[test]
    fn self_transition_skips_state_hooks() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let config = MachineConfig::new()
            .init("idle")
            .transition(TransitionDef::new("poke").from("idle").to("idle"))
            .on_named("onLeaveState", recorder(&log))
            .on_named("onEnterState", recorder(&log))
            .on_named("onTransition", recorder(&log))
            .on_named("onPoke", recorder(&log));
        let mut machine = configured(config);
        log.borrow_mut().clear();

        assert_eq!(machine.fire("poke", Vec::new()), Ok(Fired::Completed));
        assert_eq!(*log.borrow(), vec!["onTransition", "onPoke"]);
    }

    #[test]
    fn arguments_reach_hooks() {
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let mut machine = configured(matter().on(Hook::After("melt"), move |lifecycle| {
            sink.set(lifecycle.args.first().and_then(ArgValue::as_int).unwrap_or(-1));
        }));

        machine.fire("melt", vec![ArgValue::from(42)]).unwrap();
        assert_eq!(seen.get(), 42);
    }

    //--- Cancel / Fail Tests ---

    #[test]
    fn before_hook_cancels() {
        let mut machine = configured(matter().on(Hook::Before("melt"), |_| false));

        assert_eq!(machine.fire("melt", Vec::new()), Ok(Fired::Cancelled));
        assert!(machine.is("solid"));
        assert!(!machine.is_pending());
    }

    #[test]
    fn cancel_after_mutation_keeps_new_state() {
        let mut machine = configured(matter().on(Hook::EnterState, |lifecycle| {
            lifecycle.to != "liquid"
        }));

        assert_eq!(machine.fire("melt", Vec::new()), Ok(Fired::Cancelled));
        assert!(machine.is("liquid"));
        assert!(machine.can("freeze"));
    }

    #[test]
    fn failing_hook_propagates_and_clears_pending() {
        let mut machine = configured(
            matter().on(Hook::Leave("solid"), |_| HookResult::Fail("frozen solid".into())),
        );

        assert_eq!(
            machine.fire("melt", Vec::new()),
            Err(FsmError::HookFailed {
                transition: "melt".to_string(),
                hook: "onLeaveSolid".to_string(),
                reason: "frozen solid".to_string(),
            })
        );
        assert!(!machine.is_pending());
        assert!(machine.is("solid"));
    }

    //--- Deferred Tests ---

    #[test]
    fn deferred_hook_suspends_until_resolved() {
        let slot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        let mut machine = configured(matter().on(Hook::Leave("solid"), move |_| {
            let (resolver, deferred) = deferred();
            *sink.borrow_mut() = Some(resolver);
            HookResult::Defer(deferred)
        }));

        assert_eq!(machine.fire("melt", Vec::new()), Ok(Fired::Suspended));
        assert!(machine.is_pending());
        assert!(machine.is("solid"));
        assert_eq!(machine.poll(), Some(Ok(Fired::Suspended)));

        slot.borrow_mut().take().unwrap().resolve(true);
        assert_eq!(machine.poll(), Some(Ok(Fired::Completed)));
        assert!(machine.is("liquid"));
        assert_eq!(machine.poll(), None);
    }

    #[test]
    fn pending_machine_rejects_new_fires() {
        let slot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        let mut machine = configured(matter().on(Hook::Before("melt"), move |_| {
            let (resolver, deferred) = deferred::<bool>();
            *sink.borrow_mut() = Some(resolver);
            deferred
        }));
        let rejected = Rc::new(Cell::new(0));
        let counter = Rc::clone(&rejected);
        machine.set_pending_handler(move |_, _| counter.set(counter.get() + 1));

        assert_eq!(machine.fire("melt", Vec::new()), Ok(Fired::Suspended));
        assert!(!machine.can("melt"));
        assert_eq!(
            machine.fire("melt", Vec::new()),
            Ok(Fired::Rejected(Rejection::Pending))
        );
        assert_eq!(rejected.get(), 1);

        slot.borrow_mut().take().unwrap().resolve(true);
        assert_eq!(machine.poll(), Some(Ok(Fired::Completed)));
        assert!(machine.is("liquid"));
        assert!(!machine.is_pending());
    }

    #[test]
    fn deferred_false_cancels_and_rejection_fails() {
        let mut machine = configured(matter().on(Hook::Before("melt"), |_| Deferred::resolved(false)));

        assert_eq!(machine.fire("melt", Vec::new()), Ok(Fired::Cancelled));
        assert!(machine.is("solid"));

        let mut liquid = configured(
            MachineConfig::new()
                .init("liquid")
                .transition(TransitionDef::new("freeze").from("liquid").to("solid"))
                .on(Hook::Before("freeze"), |_| Deferred::<bool>::rejected("no")),
        );
        assert!(matches!(
            liquid.fire("freeze", Vec::new()),
            Err(FsmError::HookFailed { reason, .. }) if reason == "no"
        ));
        assert!(!liquid.is_pending());
    }

    #[test]
    fn dropped_resolver_fails_transition() {
        let mut machine = configured(matter().on(Hook::Before("melt"), |_| {
            let (_resolver, deferred) = deferred::<bool>();
            deferred
        }));

        assert!(matches!(
            machine.fire("melt", Vec::new()),
            Err(FsmError::HookFailed { hook, .. }) if hook == "onBeforeMelt"
        ));
        assert!(!machine.is_pending());
    }

    //--- Wildcard / Computed Tests ---

    #[test]
    fn wildcard_source_is_fallback() {
        let mut machine = configured(
            MachineConfig::new()
                .init("a")
                .transition(TransitionDef::new("reset").from_any().to("idle"))
                .transition(TransitionDef::new("reset").from("b").to("c"))
                .transition(TransitionDef::new("next").from("a").to("b")),
        );

        assert_eq!(machine.fire("reset", Vec::new()), Ok(Fired::Completed));
        assert!(machine.is("idle"));

        let mut machine = configured(
            MachineConfig::new()
                .init("a")
                .transition(TransitionDef::new("reset").from_any().to("idle"))
                .transition(TransitionDef::new("reset").from("b").to("c"))
                .transition(TransitionDef::new("next").from("a").to("b")),
        );
        machine.fire("next", Vec::new()).unwrap();
        machine.fire("reset", Vec::new()).unwrap();
        assert!(machine.is("c"));
    }

    #[test]
    fn wildcard_target_stays_in_place() {
        let mut machine = configured(
            MachineConfig::new()
                .init("idle")
                .transition(TransitionDef::new("refresh").from_any().to("*")),
        );
        assert_eq!(machine.fire("refresh", Vec::new()), Ok(Fired::Completed));
        assert!(machine.is("idle"));
    }

    #[test]
    fn computed_target_registers_destination() {
        let mut machine = configured(
            MachineConfig::new().init("start").transition(
                TransitionDef::new("route").from("start").to_computed(|args| {
                    match args.first().and_then(ArgValue::as_text) {
                        Some(state) => Destination::from(state),
                        None => Destination::from(""),
                    }
                }),
            ),
        );
        assert!(!machine.all_states().contains(&"shop".to_string()));

        assert_eq!(
            machine.fire("route", vec![ArgValue::from("shop")]),
            Ok(Fired::Completed)
        );
        assert!(machine.is("shop"));
        assert!(machine.all_states().contains(&"shop".to_string()));
        assert_eq!(machine.hook_names("shop").len(), 3);
    }

    #[test]
    fn computed_empty_destination_is_invalid() {
        let mut machine = configured(
            MachineConfig::new()
                .init("start")
                .transition(TransitionDef::new("route").to_computed(|_| Destination::from(""))),
        );
        assert_eq!(
            machine.fire("route", Vec::new()),
            Ok(Fired::Rejected(Rejection::Invalid))
        );
        assert!(!machine.is_pending());
    }

    #[test]
    fn deferred_destination_gates_pipeline() {
        let slot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut machine = configured(
            MachineConfig::new()
                .init("start")
                .transition(TransitionDef::new("route").from("start").to_computed(move |_| {
                    let (resolver, deferred) = deferred();
                    *sink.borrow_mut() = Some(resolver);
                    Destination::Defer(deferred)
                }))
                .on_named("onBeforeTransition", recorder(&log)),
        );
        log.borrow_mut().clear();

        assert_eq!(machine.fire("route", Vec::new()), Ok(Fired::Suspended));
        assert!(log.borrow().is_empty());

        slot.borrow_mut().take().unwrap().resolve("end".to_string());
        assert_eq!(machine.poll(), Some(Ok(Fired::Completed)));
        assert!(machine.is("end"));
        assert_eq!(*log.borrow(), vec!["onBeforeTransition"]);
    }

    //--- Behaviour Tests ---

    struct Door {
        locked: Rc<Cell<bool>>,
        entered: Rc<Cell<u32>>,
        ticks: Rc<Cell<f32>>,
    }

    impl StateBehaviour for Door {
        fn can_leave(&self, _to: &str) -> bool {
            !self.locked.get()
        }

        fn on_enter(&mut self, _from: &str) {
            self.entered.set(self.entered.get() + 1);
        }

        fn update(&mut self, dt: f32) {
            self.ticks.set(self.ticks.get() + dt);
        }
    }

    #[test]
    fn behaviour_vetoes_and_observes() {
        let locked = Rc::new(Cell::new(true));
        let entered = Rc::new(Cell::new(0));
        let ticks = Rc::new(Cell::new(0.0));
        let leave_hooks = Rc::new(RefCell::new(Vec::new()));

        let mut machine = StateMachine::new("door");
        machine
            .attach_behaviour(
                "closed",
                Box::new(Door {
                    locked: Rc::clone(&locked),
                    entered: Rc::clone(&entered),
                    ticks: Rc::clone(&ticks),
                }),
            )
            .unwrap();
        machine
            .configure(
                MachineConfig::new()
                    .init("closed")
                    .transition(TransitionDef::new("open").from("closed").to("opened"))
                    .on_named("onLeaveState", recorder(&leave_hooks)),
            )
            .unwrap();
        assert_eq!(entered.get(), 1);
        leave_hooks.borrow_mut().clear();

        machine.update(0.5);
        assert_eq!(ticks.get(), 0.5);

        assert_eq!(machine.fire("open", Vec::new()), Ok(Fired::Cancelled));
        assert!(machine.is("closed"));
        assert!(leave_hooks.borrow().is_empty());

        locked.set(false);
        assert_eq!(machine.fire("open", Vec::new()), Ok(Fired::Completed));
        assert!(machine.is("opened"));

        machine.update(1.0);
        assert_eq!(ticks.get(), 0.5);
    }

    #[test]
    fn add_transition_after_configure() {
        let mut machine = configured(matter());
        machine
            .add_transition(TransitionDef::new("sublimate").from("solid").to("gas"))
            .unwrap();
        assert_eq!(
            machine.add_transition(TransitionDef::new("x").from("solid").to("")),
            Err(FsmError::EmptyName("target state"))
        );

        machine.fire("sublimate", Vec::new()).unwrap();
        assert!(machine.is("gas"));
    }

    #[test]
    fn behaviour_states_survive_reconfigure() {
        struct Idle;
        impl StateBehaviour for Idle {}

        let mut machine = StateMachine::new("lobby");
        machine.attach_behaviour("waiting", Box::new(Idle)).unwrap();
        assert!(machine.all_states().contains(&"waiting".to_string()));

        assert_eq!(machine.configure(matter()), Ok(Fired::Completed));
        assert!(machine.all_states().contains(&"waiting".to_string()));
        assert!(machine.all_states().contains(&"solid".to_string()));

        machine.detach_behaviour("waiting");
        assert_eq!(machine.configure(matter()), Ok(Fired::Completed));
        assert!(!machine.all_states().contains(&"waiting".to_string()));
    }
}
