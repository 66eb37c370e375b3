//=========================================================================
// Application Context
//
// Owns the framework services for one running client.
//
// Architecture:
// ```text
//     AppContextBuilder  ──build()──>  AppContext
//         │                               ├─ events:   Rc<EventBus>
//         ├─ with_ui_config()             ├─ machines: MachineRegistry
//         ├─ with_background_count()      └─ scenes:   scene → SceneUi
//         ├─ with_lifecycle_events()                      ├─ UiManager
//         └─ with_tips()                                  └─ TipsManager
// ```
//
// Scene switches tear down the previous scene's UI before the next scene
// launches. Managers are created on first entry through the backend
// factory handed to `build`; entering the current scene again is a no-op.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

//=== Internal Dependencies ===============================================

use crate::core::event_bus::EventBus;
use crate::core::fsm::MachineRegistry;
use crate::core::ui::{
    CloseTarget, TipsKind, TipsManager, UiBackend, UiConfig, UiError, UiId, UiManager, ViewKey,
};
use crate::core::value::ArgValue;

//=== Event Names =========================================================

/// Raised before a scene's UI manager becomes current. Payload: scene name.
pub const SCENE_BEFORE_LAUNCH: &str = "scene.before_launch";

/// Raised before a UI's `on_open`. Payload: UI id.
pub const UI_BEFORE_OPEN: &str = "ui.before_open";

/// Raised after a UI's open animation. Payload: UI id.
pub const UI_OPENED: &str = "ui.opened";

/// Raised after a UI is closed. Payload: UI id.
pub const UI_CLOSED: &str = "ui.closed";

/// Creates the engine backend for a scene's UI manager.
pub type BackendFactory = Box<dyn FnMut(&str) -> UiBackend>;

//=== AppContextBuilder ===================================================

/// Builder for an [`AppContext`].
///
/// # Default Values
///
/// - **UI config**: empty
/// - **Background count**: taken from the config, else 0
/// - **Lifecycle events**: disabled
/// - **Tips**: none registered
///
/// # Examples
///
/// ```no_run
/// use aetheric_ui::AppContextBuilder;
/// use aetheric_ui::core::assets::MemoryLoader;
/// use aetheric_ui::core::ui::{HeadlessCanvas, ImmediateAnimator, UiBackend, UiConfig};
/// # use aetheric_ui::core::ui::{ViewFactory, ViewInstance, InstantiateError, UiDescriptor};
/// # use aetheric_ui::core::assets::AssetHandle;
/// # struct Factory;
/// # impl ViewFactory for Factory {
/// #     fn instantiate(&mut self, d: &UiDescriptor, _: &AssetHandle)
/// #         -> Result<ViewInstance, InstantiateError> {
/// #         Err(InstantiateError::NoInstance { path: d.asset_path.clone() })
/// #     }
/// # }
///
/// let config = UiConfig::load_from_file("ui.toml").unwrap_or_default();
/// let mut app = AppContextBuilder::new()
///     .with_ui_config(config)
///     .with_lifecycle_events(true)
///     .build(|_scene| {
///         UiBackend::new(MemoryLoader::new(), Factory, HeadlessCanvas::new(), ImmediateAnimator)
///     });
///
/// app.enter_scene("main");
/// app.update(1.0 / 60.0);
/// ```
pub struct AppContextBuilder {
    ui_config: UiConfig,
    background_count: Option<usize>,
    lifecycle_events: bool,
    tips: BTreeMap<UiId, TipsKind>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            ui_config: UiConfig::new(),
            background_count: None,
            lifecycle_events: false,
            tips: BTreeMap::new(),
        }
    }

    /// Descriptors installed into every scene's manager.
    pub fn with_ui_config(mut self, config: UiConfig) -> Self {
        self.ui_config = config;
        self
    }

    /// Overrides the config's background count.
    pub fn with_background_count(mut self, count: usize) -> Self {
        self.background_count = Some(count);
        self
    }

    /// Forwards UI open / close delegates to the event bus.
    pub fn with_lifecycle_events(mut self, enabled: bool) -> Self {
        self.lifecycle_events = enabled;
        self
    }

    /// Registers `id` as a tip in every scene. The id still needs a UI
    /// descriptor.
    pub fn with_tips(mut self, id: UiId, kind: TipsKind) -> Self {
        self.tips.insert(id, kind);
        self
    }

    pub fn build<F>(self, backend_factory: F) -> AppContext
    where
        F: FnMut(&str) -> UiBackend + 'static,
    {
        info!(
            "Building app context ({} UI descriptor(s), {} tip(s), lifecycle events: {})",
            self.ui_config.len(),
            self.tips.len(),
            self.lifecycle_events
        );

        AppContext {
            events: Rc::new(EventBus::new()),
            machines: MachineRegistry::new(),
            scenes: BTreeMap::new(),
            current: None,
            setup: SceneSetup {
                ui_config: self.ui_config,
                background_count: self.background_count,
                lifecycle_events: self.lifecycle_events,
                tips: self.tips,
                backend_factory: Box::new(backend_factory),
            },
        }
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//=== SceneSetup ==========================================================

/// UI and tips of one scene.
struct SceneUi {
    ui: UiManager,
    tips: TipsManager,
}

impl SceneUi {
    fn tear_down(&mut self) {
        self.ui.close_all();
        self.ui.clear_cache();
        self.tips.clear();
    }
}

/// Everything needed to create a scene's UI manager.
struct SceneSetup {
    ui_config: UiConfig,
    background_count: Option<usize>,
    lifecycle_events: bool,
    tips: BTreeMap<UiId, TipsKind>,
    backend_factory: BackendFactory,
}

impl SceneSetup {
    fn create(&mut self, scene: &str, events: &Rc<EventBus>) -> SceneUi {
        debug!("Creating UI manager for scene '{}'", scene);
        let backend = (self.backend_factory)(scene);
        let mut manager = UiManager::new(scene, backend);
        manager.init_config(self.ui_config.clone());
        if let Some(count) = self.background_count {
            manager.set_background_count(count);
        }
        if self.lifecycle_events {
            forward_lifecycle(&mut manager, events);
        }
        let mut tips = TipsManager::new(scene);
        tips.init_conf(self.tips.clone());
        SceneUi { ui: manager, tips }
    }
}

/// Raises the UI lifecycle events from the manager's delegates.
fn forward_lifecycle(manager: &mut UiManager, events: &Rc<EventBus>) {
    let bus = Rc::clone(events);
    manager.set_before_open_delegate(move |id, _| {
        bus.raise(UI_BEFORE_OPEN, &ArgValue::from(id));
    });
    let bus = Rc::clone(events);
    manager.set_after_open_delegate(move |id, _| {
        bus.raise(UI_OPENED, &ArgValue::from(id));
    });
    let bus = Rc::clone(events);
    manager.set_after_close_delegate(move |id| {
        bus.raise(UI_CLOSED, &ArgValue::from(id));
    });
}

//=== AppContext ==========================================================

/// Event bus, state machines and per-scene UI managers of one client.
pub struct AppContext {
    events: Rc<EventBus>,
    machines: MachineRegistry,
    scenes: BTreeMap<String, SceneUi>,
    current: Option<String>,
    setup: SceneSetup,
}

impl AppContext {
    //--- Scenes -----------------------------------------------------------

    /// Makes `scene` current and returns its UI manager.
    ///
    /// The previous scene's UI is closed and its cache cleared first,
    /// then [`SCENE_BEFORE_LAUNCH`] is raised. Entering the current scene
    /// again leaves its UI untouched and raises nothing.
    pub fn enter_scene(&mut self, scene: &str) -> &mut UiManager {
        let reentry = self.current.as_deref() == Some(scene) && self.scenes.contains_key(scene);
        if reentry {
            debug!("Scene '{}' is already current", scene);
        } else {
            if let Some(previous) = self.current.take() {
                if let Some(scene_ui) = self.scenes.get_mut(&previous) {
                    debug!("Tearing down UI of scene '{}'", previous);
                    scene_ui.tear_down();
                }
            }

            info!("Entering scene '{}'", scene);
            self.events
                .raise(SCENE_BEFORE_LAUNCH, &ArgValue::from(scene));
            self.current = Some(scene.to_string());
        }

        let setup = &mut self.setup;
        let events = &self.events;
        &mut self
            .scenes
            .entry(scene.to_string())
            .or_insert_with(|| setup.create(scene, events))
            .ui
    }

    pub fn current_scene(&self) -> Option<&str> {
        self.current.as_deref()
    }

    //--- Accessors --------------------------------------------------------

    /// UI manager of the current scene.
    pub fn ui(&self) -> Option<&UiManager> {
        self.current_scene_ui().map(|scene_ui| &scene_ui.ui)
    }

    pub fn ui_mut(&mut self) -> Option<&mut UiManager> {
        self.current_scene_ui_mut().map(|scene_ui| &mut scene_ui.ui)
    }

    /// UI manager of any scene entered so far.
    pub fn ui_for(&self, scene: &str) -> Option<&UiManager> {
        self.scenes.get(scene).map(|scene_ui| &scene_ui.ui)
    }

    /// Tips of the current scene.
    pub fn tips(&self) -> Option<&TipsManager> {
        self.current_scene_ui().map(|scene_ui| &scene_ui.tips)
    }

    fn current_scene_ui(&self) -> Option<&SceneUi> {
        self.current
            .as_deref()
            .and_then(|scene| self.scenes.get(scene))
    }

    fn current_scene_ui_mut(&mut self) -> Option<&mut SceneUi> {
        let scene = self.current.as_deref()?;
        self.scenes.get_mut(scene)
    }

    pub fn events(&self) -> &Rc<EventBus> {
        &self.events
    }

    pub fn machines(&self) -> &MachineRegistry {
        &self.machines
    }

    pub fn machines_mut(&mut self) -> &mut MachineRegistry {
        &mut self.machines
    }

    //--- Tips -------------------------------------------------------------

    /// Shows a registered tip in the current scene.
    ///
    /// Returns `None` when no scene has been entered.
    pub fn show_tips(&mut self, id: UiId, args: Vec<ArgValue>) -> Option<Result<ViewKey, UiError>> {
        let SceneUi { ui, tips } = self.current_scene_ui_mut()?;
        Some(tips.show_tips(ui, id, args))
    }

    /// Closes the current scene's newest dialog tip.
    pub fn hide_tips(&mut self) -> bool {
        match self.current_scene_ui_mut() {
            Some(SceneUi { ui, tips }) => tips.hide_tips(ui),
            None => false,
        }
    }

    /// Closes one tip by key, dialog or toast.
    pub fn close_tips(&mut self, key: ViewKey) {
        if let Some(SceneUi { ui, tips }) = self.current_scene_ui_mut() {
            ui.close(CloseTarget::View(key));
            tips.prune(ui);
        }
    }

    //--- Frame Update -----------------------------------------------------

    /// Pumps the current UI manager, expires toasts, resumes settled
    /// transitions and ticks state behaviours.
    pub fn update(&mut self, dt: f32) {
        if let Some(SceneUi { ui, tips }) = self.current_scene_ui_mut() {
            ui.update();
            tips.update(ui, dt);
        }
        self.machines.poll_all();
        self.machines.update(dt);
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("current", &self.current)
            .field("scenes", &self.scenes.keys().collect::<Vec<_>>())
            .field("machines", &self.machines.len())
            .field("lifecycle_events", &self.setup.lifecycle_events)
            .finish_non_exhaustive()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::core::assets::{Asset, MemoryLoader};
    use crate::core::fsm::{deferred, Fired, Hook, HookResult, MachineConfig, TransitionDef};
    use crate::core::ui::testing::{
        sample_config, Journal, JournalFactory, CONFIRM, HEAD, PATHS, SHOP, TOAST,
    };
    use crate::core::ui::{CloseTarget, HeadlessCanvas, ImmediateAnimator};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn build(lifecycle_events: bool) -> (AppContext, MemoryLoader) {
        let loader = MemoryLoader::new();
        for path in PATHS {
            loader.insert(path);
        }
        let shared = loader.clone();
        let app = AppContextBuilder::new()
            .with_ui_config(sample_config())
            .with_background_count(1)
            .with_lifecycle_events(lifecycle_events)
            .with_tips(CONFIRM, TipsKind::Dialog)
            .with_tips(TOAST, TipsKind::Toast { duration: 1.0 })
            .build(move |_scene| {
                UiBackend::new(
                    shared.clone(),
                    JournalFactory::new(Journal::default()),
                    HeadlessCanvas::new(),
                    ImmediateAnimator,
                )
            });
        (app, loader)
    }

    #[test]
    fn managers_are_created_per_scene() {
        init_logger();
        let (mut app, _) = build(false);
        assert!(app.ui().is_none());

        let manager = app.enter_scene("main");
        assert_eq!(manager.scene(), "main");
        assert_eq!(manager.background_count(), 1);
        assert!(manager.config().contains(HEAD));

        app.enter_scene("battle");
        assert_eq!(app.current_scene(), Some("battle"));
        assert!(app.ui_for("main").is_some());
        assert_eq!(app.ui().map(UiManager::scene), Some("battle"));
    }

    #[test]
    fn switching_scenes_tears_down_previous_ui() {
        init_logger();
        let (mut app, loader) = build(false);
        let shop = loader.insert("ui/shop");

        let manager = app.enter_scene("main");
        manager.open(HEAD, Vec::new(), None).unwrap();
        manager.open(SHOP, Vec::new(), None).unwrap();
        manager.close(CloseTarget::Top);
        assert!(manager.is_cached(SHOP));
        assert_eq!(shop.ref_count(), 1);

        app.enter_scene("battle");

        let main = app.ui_for("main").unwrap();
        assert_eq!(main.get_ui_count(), 0);
        assert!(!main.is_cached(SHOP));
        assert_eq!(shop.ref_count(), 0);
        assert_eq!(shop.acquired(), shop.released());
    }

    #[test]
    fn scene_launch_is_announced() {
        init_logger();
        let (mut app, _) = build(false);
        let launched = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&launched);
        app.events().add_listener(SCENE_BEFORE_LAUNCH, 0, move |_, payload| {
            sink.borrow_mut().push(payload.as_text().unwrap_or("").to_string());
        });

        app.enter_scene("main");
        app.enter_scene("battle");

        assert_eq!(*launched.borrow(), vec!["main", "battle"]);
    }

    #[test]
    fn reentering_current_scene_keeps_its_ui() {
        init_logger();
        let (mut app, _) = build(false);
        let launched = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&launched);
        app.events().add_listener(SCENE_BEFORE_LAUNCH, 0, move |_, _| {
            *sink.borrow_mut() += 1;
        });

        app.enter_scene("main").open(HEAD, Vec::new(), None).unwrap();
        let manager = app.enter_scene("main");

        assert!(manager.is_top_ui(HEAD));
        assert_eq!(manager.get_ui_count(), 1);
        assert_eq!(*launched.borrow(), 1);
        assert_eq!(app.current_scene(), Some("main"));
    }

    #[test]
    fn tips_live_per_scene() {
        init_logger();
        let (mut app, _) = build(false);
        assert!(app.show_tips(CONFIRM, Vec::new()).is_none());
        assert!(!app.hide_tips());

        app.enter_scene("main");
        let dialog = app.show_tips(CONFIRM, Vec::new()).unwrap().unwrap();
        app.show_tips(TOAST, Vec::new()).unwrap().unwrap();
        assert_eq!(
            app.show_tips(HEAD, Vec::new()),
            Some(Err(UiError::UnknownTips(HEAD)))
        );

        let ui = app.ui().unwrap();
        assert_eq!(ui.entry(dialog).unwrap().z_order(), 400);
        assert_eq!(ui.get_ui_count(), 2);
        let tips = app.tips().unwrap();
        assert_eq!(tips.scene(), "main");
        assert_eq!((tips.dialog_count(), tips.toast_count()), (1, 1));

        app.update(1.0);
        assert_eq!(app.tips().unwrap().toast_count(), 0);
        assert_eq!(app.ui().unwrap().get_ui_count(), 1);

        app.enter_scene("battle");
        assert_eq!(app.tips().unwrap().dialog_count(), 0);
        assert!(!app.hide_tips());

        app.enter_scene("main");
        assert_eq!(app.tips().unwrap().dialog_count(), 0);
        assert_eq!(app.ui().unwrap().get_ui_count(), 0);
    }

    #[test]
    fn tips_can_be_closed_by_key() {
        init_logger();
        let (mut app, _) = build(false);
        app.enter_scene("main");
        let toast = app.show_tips(TOAST, Vec::new()).unwrap().unwrap();
        let dialog = app.show_tips(CONFIRM, Vec::new()).unwrap().unwrap();

        app.close_tips(toast);

        let tips = app.tips().unwrap();
        assert_eq!(tips.toast_count(), 0);
        assert_eq!(tips.top_dialog(), Some(dialog));
        assert!(app.hide_tips());
        assert_eq!(app.ui().unwrap().get_ui_count(), 0);
    }

    #[test]
    fn lifecycle_events_follow_ui_delegates() {
        init_logger();
        let (mut app, _) = build(true);
        let seen = Rc::new(RefCell::new(Vec::new()));
        for event in [UI_BEFORE_OPEN, UI_OPENED, UI_CLOSED] {
            let sink = Rc::clone(&seen);
            app.events().add_listener(event, 0, move |name, payload| {
                sink.borrow_mut()
                    .push(format!("{} {}", name, payload.as_int().unwrap_or(-1)));
            });
        }

        let manager = app.enter_scene("main");
        manager.open(HEAD, Vec::new(), None).unwrap();
        manager.close(CloseTarget::Top);

        assert_eq!(
            *seen.borrow(),
            vec!["ui.before_open 2", "ui.opened 2", "ui.closed 2"]
        );
    }

    #[test]
    fn lifecycle_events_are_opt_in() {
        init_logger();
        let (mut app, _) = build(false);
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        app.events().add_listener(UI_OPENED, 0, move |_, _| {
            *sink.borrow_mut() += 1;
        });

        app.enter_scene("main").open(HEAD, Vec::new(), None).unwrap();

        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn update_resumes_deferred_transitions() {
        init_logger();
        let (mut app, _) = build(false);
        let (resolver, pending) = deferred::<bool>();
        let mut pending = Some(pending);

        let machine = app.machines_mut().get_or_create("door").unwrap();
        machine
            .configure(
                MachineConfig::new()
                    .init("closed")
                    .transition(TransitionDef::new("open").from("closed").to("opened"))
                    .on(Hook::Before("open"), move |_| {
                        pending.take().map_or(HookResult::Continue, HookResult::Defer)
                    }),
            )
            .unwrap();

        assert_eq!(machine.fire("open", Vec::new()), Ok(Fired::Suspended));
        assert!(app.machines().get("door").unwrap().is_pending());

        resolver.resolve(true);
        app.update(0.016);

        let machine = app.machines().get("door").unwrap();
        assert!(!machine.is_pending());
        assert_eq!(machine.state(), "opened");
    }
}
