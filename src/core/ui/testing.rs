//=========================================================================
// Test Support
//=========================================================================
//
// Journaling views and a headless harness shared by the UI manager and the
// application context tests.
//
// Views append to a shared journal:
//   "init 2"  "open 2 from Some(1)"  "over 2"  "close 2"  "top 1 after 2 bye 2"
//
//=========================================================================

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use super::animation::{ImmediateAnimator, ManualAnimator};
use super::canvas::HeadlessCanvas;
use super::descriptor::{Color, ShowType, UiConfig, UiDescriptor, UiId, UiLayer};
use super::manager::{UiBackend, UiManager};
use super::view::{InstantiateError, NodeId, UiView, ViewContext, ViewFactory, ViewInstance};
use crate::core::assets::{AssetHandle, AssetKeeper, MemoryLoader, SharedAsset};
use crate::core::value::ArgValue;

//=== Sample Configuration ================================================

pub(crate) const BAG: UiId = 1;
pub(crate) const HEAD: UiId = 2;
pub(crate) const SHOP: UiId = 3;
pub(crate) const DIALOG: UiId = 4;
pub(crate) const FULL: UiId = 5;
pub(crate) const TOAST: UiId = 6;
pub(crate) const CONFIRM: UiId = 7;

pub(crate) const PATHS: [&str; 7] = [
    "ui/bag",
    "ui/head",
    "ui/shop",
    "ui/dialog",
    "ui/full",
    "ui/toast",
    "ui/confirm",
];

pub(crate) fn sample_config() -> UiConfig {
    UiConfig::new()
        .with(UiDescriptor::new(BAG, "ui/bag").with_multi_instance())
        .with(UiDescriptor::new(HEAD, "ui/head"))
        .with(UiDescriptor::new(SHOP, "ui/shop").with_cache())
        .with(
            UiDescriptor::new(DIALOG, "ui/dialog")
                .with_show_type(ShowType::Addition)
                .with_prevent_touch(Some(Color::rgba(0, 0, 0, 150)))
                .with_quick_close()
                .with_layer(UiLayer::Dialog),
        )
        .with(UiDescriptor::new(FULL, "ui/full").with_show_type(ShowType::FullScreen))
        .with(
            UiDescriptor::new(TOAST, "ui/toast")
                .with_multi_instance()
                .with_show_type(ShowType::Addition),
        )
        .with(
            UiDescriptor::new(CONFIRM, "ui/confirm")
                .with_multi_instance()
                .with_show_type(ShowType::Addition)
                .with_prevent_touch(None),
        )
}

//=== JournalView =========================================================

pub(crate) type Journal = Rc<RefCell<Vec<String>>>;

type OpenScript = Rc<dyn Fn(&mut ViewContext<'_>)>;

pub(crate) struct JournalView {
    id: UiId,
    keeper: AssetKeeper,
    journal: Journal,
    on_open: Option<OpenScript>,
}

impl JournalView {
    fn log(&self, entry: String) {
        self.journal.borrow_mut().push(entry);
    }
}

impl UiView for JournalView {
    fn keeper(&mut self) -> &mut AssetKeeper {
        &mut self.keeper
    }

    fn init(&mut self, _args: &[ArgValue]) {
        self.log(format!("init {}", self.id));
    }

    fn on_open(&mut self, ctx: &mut ViewContext<'_>, from: Option<UiId>, _args: &[ArgValue]) {
        self.log(format!("open {} from {:?}", self.id, from));
        if let Some(script) = &self.on_open {
            script(ctx);
        }
    }

    fn on_open_animation_over(&mut self, _ctx: &mut ViewContext<'_>) {
        self.log(format!("over {}", self.id));
    }

    fn on_close(&mut self, _ctx: &mut ViewContext<'_>) -> ArgValue {
        self.log(format!("close {}", self.id));
        ArgValue::from(format!("bye {}", self.id))
    }

    fn on_top(&mut self, _ctx: &mut ViewContext<'_>, closed: UiId, result: ArgValue) {
        self.log(format!(
            "top {} after {} {}",
            self.id,
            closed,
            result.as_text().unwrap_or("")
        ));
    }
}

//=== JournalFactory ======================================================

#[derive(Default)]
struct FactoryState {
    next_node: u64,
    missing_view: HashSet<UiId>,
    no_instance: HashSet<UiId>,
    created: HashMap<UiId, usize>,
    scripts: HashMap<UiId, OpenScript>,
}

#[derive(Clone)]
pub(crate) struct JournalFactory {
    journal: Journal,
    state: Rc<RefCell<FactoryState>>,
}

impl JournalFactory {
    pub(crate) fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Rc::default(),
        }
    }

    pub(crate) fn fail_missing_view(&self, id: UiId) {
        self.state.borrow_mut().missing_view.insert(id);
    }

    pub(crate) fn fail_no_instance(&self, id: UiId) {
        self.state.borrow_mut().no_instance.insert(id);
    }

    /// Number of views created for `id`.
    pub(crate) fn created(&self, id: UiId) -> usize {
        self.state.borrow().created.get(&id).copied().unwrap_or(0)
    }

    /// Runs `script` inside every `on_open` of `id`.
    pub(crate) fn on_open<F>(&self, id: UiId, script: F)
    where
        F: Fn(&mut ViewContext<'_>) + 'static,
    {
        self.state.borrow_mut().scripts.insert(id, Rc::new(script));
    }
}

impl ViewFactory for JournalFactory {
    fn instantiate(
        &mut self,
        descriptor: &UiDescriptor,
        _asset: &AssetHandle,
    ) -> Result<ViewInstance, InstantiateError> {
        let mut state = self.state.borrow_mut();
        let path = descriptor.asset_path.clone();
        if state.no_instance.contains(&descriptor.id) {
            return Err(InstantiateError::NoInstance { path });
        }
        if state.missing_view.contains(&descriptor.id) {
            return Err(InstantiateError::MissingView { path });
        }

        state.next_node += 1;
        *state.created.entry(descriptor.id).or_default() += 1;
        let view = JournalView {
            id: descriptor.id,
            keeper: AssetKeeper::new(),
            journal: Rc::clone(&self.journal),
            on_open: state.scripts.get(&descriptor.id).cloned(),
        };

        Ok(ViewInstance {
            node: NodeId(state.next_node),
            view: Box::new(view),
        })
    }
}

//=== Harness =============================================================

/// A manager wired to headless backends, plus handles to inspect them.
pub(crate) struct Harness {
    pub manager: UiManager,
    pub loader: MemoryLoader,
    pub factory: JournalFactory,
    pub canvas: HeadlessCanvas,
    pub animator: ManualAnimator,
    pub journal: Journal,
    pub assets: HashMap<&'static str, Arc<SharedAsset>>,
}

impl Harness {
    /// Loads and animations complete inside each call.
    pub(crate) fn immediate() -> Self {
        Self::build(false)
    }

    /// Loads and animations wait for [`settle`](Self::settle).
    pub(crate) fn deferred() -> Self {
        Self::build(true)
    }

    fn build(deferred: bool) -> Self {
        let loader = if deferred {
            MemoryLoader::deferred()
        } else {
            MemoryLoader::new()
        };
        let assets = PATHS
            .iter()
            .map(|path| (*path, loader.insert(*path)))
            .collect();
        let journal = Journal::default();
        let factory = JournalFactory::new(Rc::clone(&journal));
        let canvas = HeadlessCanvas::new();
        let animator = ManualAnimator::new();

        let backend = if deferred {
            UiBackend::new(loader.clone(), factory.clone(), canvas.clone(), animator.clone())
        } else {
            UiBackend::new(loader.clone(), factory.clone(), canvas.clone(), ImmediateAnimator)
        };
        let mut manager = UiManager::new("test", backend);
        manager.init_config(sample_config());

        Self {
            manager,
            loader,
            factory,
            canvas,
            animator,
            journal,
            assets,
        }
    }

    /// Completes every pending load and animation until nothing moves.
    pub(crate) fn settle(&mut self) {
        loop {
            let loads = self.loader.complete_all();
            let animations = self.animator.finish_all();
            self.manager.update();
            if loads == 0 && animations == 0 {
                break;
            }
        }
    }

    /// Completes exactly one pending load or animation, then pumps.
    pub(crate) fn step(&mut self) -> bool {
        let moved = self.loader.complete_next() || self.animator.finish_next();
        self.manager.update();
        moved
    }

    pub(crate) fn asset(&self, path: &str) -> &Arc<SharedAsset> {
        &self.assets[path]
    }

    pub(crate) fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    pub(crate) fn clear_journal(&self) {
        self.journal.borrow_mut().clear();
    }

    pub(crate) fn position(&self, entry: &str) -> Option<usize> {
        self.journal.borrow().iter().position(|logged| logged == entry)
    }
}
