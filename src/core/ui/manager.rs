//=========================================================================
// UI Manager
//=========================================================================
//
// Ordered stack of open UI instances, an instance cache and the request
// queues that serialise opens and closes.
//
// Architecture:
//   UiManager
//     ├─ stack:  Vec<UiStackEntry>      (sorted by z_order, stable)
//     ├─ cache:  BTreeMap<UiId, Mounted>
//     ├─ queues: closes, opens          (FIFO, filled while busy)
//     └─ backend: loader, factory, canvas, animator
//
// Flow:
//   open  → placeholder → load → instantiate → attach → on_open
//         → open animation → on_open_animation_over → Idle
//   close → remove → close animation → on_close / on_top → cache | destroy
//         → Idle
//
// Only one open or close is in flight at a time (the phase). Async
// completions arrive through the completion collector and are handled
// by `pump`, which then drains one queued request per free slot,
// closes first.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

use log::{debug, error, info, warn};

//=== Internal Dependencies ===============================================

use super::animation::{AnimationClip, UiAnimator};
use super::canvas::{BlockerId, Canvas, SiblingOrder};
use super::completion::{Completion, CompletionCollector, Ticket};
use super::descriptor::{ShowType, UiConfig, UiDescriptor, UiId};
use super::error::UiError;
use super::request::{CloseTarget, OpenRequest, RequestQueue, UiCommand};
use super::view::{NodeId, UiView, ViewContext, ViewFactory, ViewInstance, ViewKey};
use super::visibility::compute_visibility;
use crate::core::assets::{AssetHandle, AssetLoader, LoadError, LoadRequest, ProgressFn};
use crate::core::value::ArgValue;

//=== Public Types ========================================================

/// What the manager is busy with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Opening,
    Closing,
}

/// Result of an accepted `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The open started; the instance is on the stack.
    Started(ViewKey),
    /// The manager was busy; the request runs later as this instance.
    Queued(ViewKey),
    /// A single-instance UI was already open: everything above it was
    /// closed and it was reopened as this instance.
    BroughtToFront(ViewKey),
}

impl OpenOutcome {
    /// Key of the instance the open creates.
    pub fn key(self) -> ViewKey {
        match self {
            Self::Started(key) | Self::Queued(key) | Self::BroughtToFront(key) => key,
        }
    }
}

/// Delegate invoked around opens: `(opened, beneath)`.
pub type OpenDelegate = Box<dyn FnMut(UiId, Option<UiId>)>;

/// Delegate invoked after a close: `(closed)`.
pub type CloseDelegate = Box<dyn FnMut(UiId)>;

//=== UiBackend ===========================================================

/// Engine collaborators a manager drives.
pub struct UiBackend {
    pub loader: Box<dyn AssetLoader>,
    pub factory: Box<dyn ViewFactory>,
    pub canvas: Box<dyn Canvas>,
    pub animator: Box<dyn UiAnimator>,
}

impl UiBackend {
    pub fn new(
        loader: impl AssetLoader + 'static,
        factory: impl ViewFactory + 'static,
        canvas: impl Canvas + 'static,
        animator: impl UiAnimator + 'static,
    ) -> Self {
        Self {
            loader: Box::new(loader),
            factory: Box::new(factory),
            canvas: Box::new(canvas),
            animator: Box::new(animator),
        }
    }
}

//=== UiStackEntry ========================================================

/// An instantiated view and its root node.
struct Mounted {
    node: NodeId,
    view: Box<dyn UiView>,
}

/// One open UI instance.
pub struct UiStackEntry {
    key: ViewKey,
    mounted: Option<Mounted>,
    args: Vec<ArgValue>,
    blocker: Option<BlockerId>,
    z_order: i32,
    auto_z: bool,
    closed: bool,
    descriptor: Arc<UiDescriptor>,
    visible: bool,
}

impl UiStackEntry {
    pub fn key(&self) -> ViewKey {
        self.key
    }

    /// The view, or `None` while its asset is still loading.
    pub fn view(&self) -> Option<&dyn UiView> {
        self.mounted.as_ref().map(|mounted| mounted.view.as_ref())
    }

    pub fn node(&self) -> Option<NodeId> {
        self.mounted.as_ref().map(|mounted| mounted.node)
    }

    pub fn is_loaded(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }

    pub fn blocker(&self) -> Option<BlockerId> {
        self.blocker
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    /// True if the z-order was assigned by the manager.
    pub fn is_auto_z(&self) -> bool {
        self.auto_z
    }

    /// True once a close was requested for this instance.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Descriptor snapshot taken when the instance was opened.
    pub fn descriptor(&self) -> &Arc<UiDescriptor> {
        &self.descriptor
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl fmt::Debug for UiStackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiStackEntry")
            .field("key", &self.key)
            .field("node", &self.node())
            .field("z_order", &self.z_order)
            .field("closed", &self.closed)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

//=== In-Flight Operations ================================================

/// A closed entry waiting for its close animation.
struct Closing {
    entry: UiStackEntry,
    mounted: Mounted,
    beneath: Option<ViewKey>,
}

enum InFlight {
    Load {
        ticket: Ticket,
        key: ViewKey,
        from: Option<UiId>,
    },
    OpenAnimation {
        ticket: Ticket,
        key: ViewKey,
        from: Option<UiId>,
    },
    CloseAnimation {
        ticket: Ticket,
        closing: Box<Closing>,
    },
}

//=== UiManager ===========================================================

/// Opens, stacks, caches and closes UI screens for one scene.
pub struct UiManager {
    scene: String,
    config: Arc<UiConfig>,
    background_count: usize,
    stack: Vec<UiStackEntry>,
    cache: BTreeMap<UiId, Mounted>,
    open_queue: RequestQueue<OpenRequest>,
    close_queue: RequestQueue<CloseTarget>,
    in_flight: Option<InFlight>,
    completions: CompletionCollector,
    next_instance: u64,
    backend: UiBackend,
    before_open: Option<OpenDelegate>,
    after_open: Option<OpenDelegate>,
    after_close: Option<CloseDelegate>,
}

impl UiManager {
    //--- Construction -----------------------------------------------------

    /// Creates an idle manager with an empty configuration.
    pub fn new(scene: impl Into<String>, backend: UiBackend) -> Self {
        Self {
            scene: scene.into(),
            config: Arc::new(UiConfig::new()),
            background_count: 0,
            stack: Vec::new(),
            cache: BTreeMap::new(),
            open_queue: RequestQueue::new(),
            close_queue: RequestQueue::new(),
            in_flight: None,
            completions: CompletionCollector::new(),
            next_instance: 0,
            backend,
            before_open: None,
            after_open: None,
            after_close: None,
        }
    }

    //--- Configuration ----------------------------------------------------

    /// Replaces the whole configuration.
    ///
    /// Open instances keep the descriptors they were opened with.
    pub fn init_config(&mut self, config: UiConfig) {
        if let Some(count) = config.background_count() {
            self.background_count = count;
        }
        info!(
            "[{}] UI config installed with {} descriptor(s)",
            self.scene,
            config.len()
        );
        self.config = Arc::new(config);
        self.refresh_visibility();
    }

    /// Adds or replaces the descriptor of `id`.
    pub fn set_config(&mut self, id: UiId, mut descriptor: UiDescriptor) {
        descriptor.id = id;
        Arc::make_mut(&mut self.config).insert(descriptor);
        debug!("[{}] descriptor {} updated", self.scene, id);
    }

    pub fn config(&self) -> &Arc<UiConfig> {
        &self.config
    }

    /// Number of bottom entries kept visible beneath a `Single` UI.
    pub fn set_background_count(&mut self, count: usize) {
        self.background_count = count;
        self.refresh_visibility();
    }

    pub fn background_count(&self) -> usize {
        self.background_count
    }

    pub fn set_before_open_delegate<F>(&mut self, delegate: F)
    where
        F: FnMut(UiId, Option<UiId>) + 'static,
    {
        self.before_open = Some(Box::new(delegate));
    }

    pub fn set_after_open_delegate<F>(&mut self, delegate: F)
    where
        F: FnMut(UiId, Option<UiId>) + 'static,
    {
        self.after_open = Some(Box::new(delegate));
    }

    pub fn set_after_close_delegate<F>(&mut self, delegate: F)
    where
        F: FnMut(UiId) + 'static,
    {
        self.after_close = Some(Box::new(delegate));
    }

    //--- Requests ---------------------------------------------------------

    /// Opens `id` with `args`.
    ///
    /// Unknown ids are rejected. Load or instantiation failures are
    /// logged and absorbed; the open simply never appears.
    pub fn open(
        &mut self,
        id: UiId,
        args: Vec<ArgValue>,
        progress: Option<ProgressFn>,
    ) -> Result<OpenOutcome, UiError> {
        let mut request = OpenRequest::new(id, args);
        request.progress = progress;
        self.open_request(request)
    }

    /// Opens with a fully specified request (z-order override, progress).
    pub fn open_request(&mut self, request: OpenRequest) -> Result<OpenOutcome, UiError> {
        let outcome = self.request_open(request);
        self.pump();
        outcome
    }

    /// Closes a UI. Closing an empty stack is a no-op.
    pub fn close(&mut self, target: CloseTarget) {
        self.request_close(target);
        self.pump();
    }

    /// Closes the top UI, then opens `id`.
    pub fn replace(&mut self, id: UiId, args: Vec<ArgValue>) -> Result<OpenOutcome, UiError> {
        if !self.config.contains(id) {
            error!("[{}] replace with unknown UI id {}", self.scene, id);
            return Err(UiError::UnknownUi(id));
        }
        self.request_close(CloseTarget::Top);
        let outcome = self.request_open(OpenRequest::new(id, args));
        self.pump();
        outcome
    }

    /// Tears down every entry synchronously and clears both queues.
    ///
    /// Skips animations, the cache and the after-close delegate.
    pub fn close_all(&mut self) {
        let mut entries = mem::take(&mut self.stack);
        if let Some(InFlight::CloseAnimation { closing, .. }) = self.in_flight.take() {
            let Closing {
                mut entry, mounted, ..
            } = *closing;
            entry.mounted = Some(mounted);
            entries.push(entry);
        }
        self.open_queue.clear();
        self.close_queue.clear();

        let count = entries.len();
        let mut discarded = Vec::new();
        for mut entry in entries.into_iter().rev() {
            entry.closed = true;
            if let Some(blocker) = entry.blocker.take() {
                self.backend.canvas.destroy_blocker(blocker);
            }
            if let Some(mut mounted) = entry.mounted.take() {
                mounted
                    .view
                    .on_close(&mut ViewContext::new(entry.key, &mut discarded));
                self.destroy_mounted(mounted);
            }
        }

        if !discarded.is_empty() {
            debug!(
                "[{}] dropped {} request(s) issued during close_all",
                self.scene,
                discarded.len()
            );
        }
        info!("[{}] closed all {} UI(s)", self.scene, count);
        self.pump();
    }

    /// Closes everything above the last instance of `id`.
    ///
    /// With `reopen_self` the instance itself is closed too and `id` is
    /// opened again with `args`; otherwise it becomes top and receives
    /// `on_top`. Returns false if `id` is not on the stack.
    pub fn close_to_ui(&mut self, id: UiId, reopen_self: bool, args: Vec<ArgValue>) -> bool {
        let found = self.close_to_ui_inner(id, reopen_self, args);
        self.pump();
        found
    }

    /// Releases and destroys every cached instance.
    pub fn clear_cache(&mut self) {
        let cached = mem::take(&mut self.cache);
        if !cached.is_empty() {
            debug!("[{}] clearing {} cached UI(s)", self.scene, cached.len());
        }
        for mounted in cached.into_values() {
            self.destroy_mounted(mounted);
        }
    }

    /// Quick-close entry point for background taps.
    ///
    /// Returns true if the tap requested a close.
    pub fn on_background_tap(&mut self, key: ViewKey) -> bool {
        let quick_close = self
            .entry(key)
            .map_or(false, |entry| entry.descriptor.quick_close && !entry.closed);
        if quick_close {
            debug!("[{}] quick close of {}", self.scene, key);
            self.close(CloseTarget::View(key));
        }
        quick_close
    }

    /// Handles pending completions and drains the queues.
    pub fn update(&mut self) {
        self.pump();
    }

    //--- Query API --------------------------------------------------------

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn phase(&self) -> Phase {
        match self.in_flight {
            None => Phase::Idle,
            Some(InFlight::Load { .. } | InFlight::OpenAnimation { .. }) => Phase::Opening,
            Some(InFlight::CloseAnimation { .. }) => Phase::Closing,
        }
    }

    pub fn is_top_ui(&self, id: UiId) -> bool {
        self.stack.last().map_or(false, |entry| entry.key.ui_id == id)
    }

    /// View of the first (lowest) instance of `id`.
    pub fn get_ui(&self, id: UiId) -> Option<&dyn UiView> {
        self.stack
            .iter()
            .find(|entry| entry.key.ui_id == id)
            .and_then(UiStackEntry::view)
    }

    pub fn get_ui_mut(&mut self, id: UiId) -> Option<&mut dyn UiView> {
        let entry = self.stack.iter_mut().find(|entry| entry.key.ui_id == id)?;
        let view: &mut dyn UiView = entry.mounted.as_mut()?.view.as_mut();
        Some(view)
    }

    pub fn get_top_ui(&self) -> Option<&dyn UiView> {
        self.stack.last().and_then(UiStackEntry::view)
    }

    /// Index of the first instance of `id`.
    pub fn get_ui_index(&self, id: UiId) -> Option<usize> {
        self.stack.iter().position(|entry| entry.key.ui_id == id)
    }

    /// Indices of every instance of `id`, ascending.
    pub fn get_ui_indices(&self, id: UiId) -> Vec<usize> {
        self.stack
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.key.ui_id == id)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn get_ui_count(&self) -> usize {
        self.stack.len()
    }

    pub fn is_cached(&self, id: UiId) -> bool {
        self.cache.contains_key(&id)
    }

    pub fn stack(&self) -> &[UiStackEntry] {
        &self.stack
    }

    pub fn stack_keys(&self) -> Vec<ViewKey> {
        self.stack.iter().map(|entry| entry.key).collect()
    }

    pub fn entry(&self, key: ViewKey) -> Option<&UiStackEntry> {
        self.stack.iter().find(|entry| entry.key == key)
    }

    /// True while `key` is on the stack and not closing, or waiting in
    /// the open queue.
    pub fn is_live(&self, key: ViewKey) -> bool {
        self.stack.iter().any(|entry| entry.key == key && !entry.closed)
            || self.open_queue.iter().any(|request| request.key == Some(key))
    }

    pub fn is_visible(&self, key: ViewKey) -> bool {
        self.entry(key).map_or(false, |entry| entry.visible)
    }

    /// Ids of queued opens, oldest first.
    pub fn queued_opens(&self) -> Vec<UiId> {
        self.open_queue.iter().map(|request| request.id).collect()
    }

    /// Queued close targets, oldest first.
    pub fn queued_closes(&self) -> Vec<CloseTarget> {
        self.close_queue.iter().copied().collect()
    }

    //--- Request Handling -------------------------------------------------

    fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    fn request_open(&mut self, mut request: OpenRequest) -> Result<OpenOutcome, UiError> {
        if !self.config.contains(request.id) {
            error!("[{}] open of unknown UI id {}", self.scene, request.id);
            return Err(UiError::UnknownUi(request.id));
        }
        let key = match request.key {
            Some(key) => key,
            None => self.allocate_key(request.id),
        };
        request.key = Some(key);
        if !self.is_idle() {
            debug!(
                "[{}] open of {} queued ({:?})",
                self.scene,
                request.id,
                self.phase()
            );
            self.open_queue.push(request);
            return Ok(OpenOutcome::Queued(key));
        }
        self.open_now(request)
    }

    fn request_close(&mut self, target: CloseTarget) {
        if self.cancel_queued_open(target) {
            return;
        }
        if self.is_idle() {
            self.close_now(target);
        } else {
            debug!("[{}] close of {:?} queued ({:?})", self.scene, target, self.phase());
            self.enqueue_close(target);
        }
    }

    /// Drops a queued open addressed by `target`, if there is one.
    fn cancel_queued_open(&mut self, target: CloseTarget) -> bool {
        let CloseTarget::View(key) = target else {
            return false;
        };
        let removed = self.open_queue.retain(|request| request.key != Some(key));
        if removed > 0 {
            debug!("[{}] queued open of {} cancelled", self.scene, key);
        }
        removed > 0
    }

    fn enqueue_close(&mut self, target: CloseTarget) {
        if let CloseTarget::View(key) = target {
            if let Some(entry) = self.stack.iter_mut().find(|entry| entry.key == key) {
                entry.closed = true;
            }
        }
        self.close_queue.push(target);
    }

    /// Queues requests issued by views during a hook.
    fn apply_commands(&mut self, commands: Vec<UiCommand>) {
        for command in commands {
            match command {
                UiCommand::Open { id, args } => {
                    if self.config.contains(id) {
                        self.open_queue.push(OpenRequest::new(id, args));
                    } else {
                        error!("[{}] view requested unknown UI id {}", self.scene, id);
                    }
                }
                UiCommand::Close(target) => {
                    if !self.cancel_queued_open(target) {
                        self.enqueue_close(target);
                    }
                }
            }
        }
    }

    /// Handles completions and drains queued requests until nothing moves.
    fn pump(&mut self) {
        loop {
            let completions = self.completions.collect();
            let handled = !completions.is_empty();
            for completion in completions {
                self.handle_completion(completion);
            }
            if !self.drain_next() && !handled {
                break;
            }
        }
    }

    /// Starts one queued request if idle, closes first.
    fn drain_next(&mut self) -> bool {
        if !self.is_idle() {
            return false;
        }
        if let Some(target) = self.close_queue.pop() {
            self.close_now(target);
            return true;
        }
        if let Some(request) = self.open_queue.pop() {
            let id = request.id;
            if let Err(err) = self.open_now(request) {
                warn!("[{}] queued open of {} dropped: {}", self.scene, id, err);
            }
            return true;
        }
        false
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::AssetLoaded { ticket, result } => self.finish_load(ticket, result),
            Completion::AnimationFinished { ticket } => self.finish_animation(ticket),
        }
    }

    //--- Opening ----------------------------------------------------------

    fn open_now(&mut self, request: OpenRequest) -> Result<OpenOutcome, UiError> {
        let Some(descriptor) = self.config.get(request.id).cloned() else {
            error!("[{}] open of unknown UI id {}", self.scene, request.id);
            return Err(UiError::UnknownUi(request.id));
        };

        if descriptor.multi_instance {
            return Ok(self.start_open(descriptor, request));
        }

        match self.stack.iter().rposition(|entry| entry.key.ui_id == request.id) {
            Some(index) => {
                debug!("[{}] {} already open, bringing to front", self.scene, request.id);
                let mut commands = Vec::new();
                self.unwind_to(index, &mut commands);
                self.refresh_visibility();
                let outcome = self.start_open(descriptor, request);
                self.apply_commands(commands);
                Ok(match outcome {
                    OpenOutcome::Started(key) => OpenOutcome::BroughtToFront(key),
                    other => other,
                })
            }
            None => Ok(self.start_open(descriptor, request)),
        }
    }

    /// Pushes a placeholder and obtains the view (cache, else load).
    fn start_open(&mut self, descriptor: Arc<UiDescriptor>, request: OpenRequest) -> OpenOutcome {
        let OpenRequest {
            id,
            args,
            progress,
            z_order,
            key,
        } = request;

        let key = match key {
            Some(key) => key,
            None => self.allocate_key(id),
        };
        let from = self.stack.last().map(|entry| entry.key.ui_id);

        let (z_order, auto_z) = match z_order.or(descriptor.z_order) {
            Some(z_order) => (z_order, false),
            None => (self.next_auto_z(), true),
        };

        let blocker = if descriptor.prevent_touch {
            Some(
                self.backend
                    .canvas
                    .create_blocker(SiblingOrder::blocker(z_order), descriptor.prevent_color),
            )
        } else {
            None
        };

        self.stack.push(UiStackEntry {
            key,
            mounted: None,
            args,
            blocker,
            z_order,
            auto_z,
            closed: false,
            descriptor: Arc::clone(&descriptor),
            visible: false,
        });
        self.stack.sort_by_key(|entry| entry.z_order);
        debug!("[{}] opening {} at z {}", self.scene, key, z_order);

        if let Some(mounted) = self.cache.remove(&id) {
            debug!("[{}] reusing cached instance of {}", self.scene, id);
            if let Some(progress) = progress {
                progress(1, 1);
            }
            self.activate(key, mounted, from);
            return OpenOutcome::Started(key);
        }

        let ticket = self.completions.next_ticket();
        self.in_flight = Some(InFlight::Load { ticket, key, from });
        let done = self.completions.load_done(ticket, &descriptor.asset_path);
        let request = LoadRequest::new(descriptor.asset_path.clone(), descriptor.bundle.clone());
        self.backend.loader.load(request, progress, done);

        OpenOutcome::Started(key)
    }

    fn allocate_key(&mut self, id: UiId) -> ViewKey {
        self.next_instance += 1;
        ViewKey {
            ui_id: id,
            instance: self.next_instance,
        }
    }

    fn next_auto_z(&self) -> i32 {
        self.stack
            .iter()
            .filter(|entry| entry.auto_z)
            .map(|entry| entry.z_order)
            .max()
            .map_or(1, |z_order| z_order + 1)
    }

    fn finish_load(&mut self, ticket: Ticket, result: Result<AssetHandle, LoadError>) {
        let (key, from) = match self.in_flight {
            Some(InFlight::Load {
                ticket: current,
                key,
                from,
            }) if current == ticket => (key, from),
            _ => {
                debug!("[{}] stale load completion {}", self.scene, ticket);
                if let Ok(asset) = result {
                    balance(&asset);
                }
                return;
            }
        };
        self.in_flight = None;

        let Some(index) = self.index_of(key) else {
            debug!("[{}] {} left the stack while loading", self.scene, key);
            if let Ok(asset) = result {
                balance(&asset);
            }
            return;
        };

        let asset = match result {
            Ok(asset) => asset,
            Err(err) => {
                warn!("[{}] failed to load UI {}: {}", self.scene, key.ui_id, err);
                self.discard_placeholder(key);
                return;
            }
        };

        if self.stack[index].closed {
            debug!("[{}] {} closed while loading", self.scene, key);
            balance(&asset);
            self.discard_placeholder(key);
            return;
        }

        let descriptor = Arc::clone(&self.stack[index].descriptor);
        match self.backend.factory.instantiate(&descriptor, &asset) {
            Ok(ViewInstance { node, mut view }) => {
                view.init(&self.stack[index].args);
                view.cache_asset(asset);
                self.activate(key, Mounted { node, view }, from);
            }
            Err(err) => {
                warn!(
                    "[{}] failed to instantiate UI {} ({}): {}",
                    self.scene, key.ui_id, descriptor.asset_path, err
                );
                balance(&asset);
                self.discard_placeholder(key);
            }
        }
    }

    /// Attaches a view to its placeholder and runs the open hooks.
    ///
    /// `from` is the UI that was on top when the open started.
    fn activate(&mut self, key: ViewKey, mounted: Mounted, from: Option<UiId>) {
        let Some(index) = self.index_of(key) else {
            self.destroy_mounted(mounted);
            return;
        };

        let node = mounted.node;
        let (z_order, quick_close) = {
            let entry = &self.stack[index];
            (entry.z_order, entry.descriptor.quick_close)
        };

        self.backend.canvas.attach(node, SiblingOrder::content(z_order));
        self.backend.canvas.set_active(node, true);
        if quick_close {
            self.backend.canvas.bind_quick_close(node, key);
        }
        self.stack[index].mounted = Some(mounted);
        self.refresh_visibility();

        if let Some(delegate) = self.before_open.as_mut() {
            delegate(key.ui_id, from);
        }

        let mut commands = Vec::new();
        let entry = &mut self.stack[index];
        if let Some(mounted) = entry.mounted.as_mut() {
            mounted
                .view
                .on_open(&mut ViewContext::new(key, &mut commands), from, &entry.args);
        }

        let ticket = self.completions.next_ticket();
        self.in_flight = Some(InFlight::OpenAnimation { ticket, key, from });
        let done = self.completions.animation_done(ticket);
        self.backend.animator.play(node, AnimationClip::Open, done);

        self.apply_commands(commands);
    }

    fn finish_open(&mut self, key: ViewKey, from: Option<UiId>) {
        let mut commands = Vec::new();
        match self.stack.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                if let Some(mounted) = entry.mounted.as_mut() {
                    mounted
                        .view
                        .on_open_animation_over(&mut ViewContext::new(key, &mut commands));
                }
                if let Some(delegate) = self.after_open.as_mut() {
                    delegate(key.ui_id, from);
                }
                debug!("[{}] opened {}", self.scene, key);
            }
            None => debug!("[{}] {} left the stack during its open animation", self.scene, key),
        }
        self.apply_commands(commands);
    }

    /// Removes a placeholder whose open failed or was cancelled.
    fn discard_placeholder(&mut self, key: ViewKey) {
        if let Some(index) = self.index_of(key) {
            let mut entry = self.stack.remove(index);
            entry.closed = true;
            if let Some(blocker) = entry.blocker.take() {
                self.backend.canvas.destroy_blocker(blocker);
            }
            self.refresh_visibility();
        }
    }

    //--- Closing ----------------------------------------------------------

    fn close_now(&mut self, target: CloseTarget) {
        let index = match target {
            CloseTarget::Top => self.stack.len().checked_sub(1),
            CloseTarget::View(key) => self.stack.iter().rposition(|entry| entry.key == key),
        };
        let Some(index) = index else {
            debug!("[{}] nothing to close for {:?}", self.scene, target);
            return;
        };

        let mut entry = self.stack.remove(index);
        entry.closed = true;
        if let Some(blocker) = entry.blocker.take() {
            self.backend.canvas.destroy_blocker(blocker);
        }
        let beneath = index
            .checked_sub(1)
            .map(|below| self.stack[below].key);
        self.refresh_visibility();

        let Some(mounted) = entry.mounted.take() else {
            debug!("[{}] closed placeholder {}", self.scene, entry.key);
            return;
        };

        debug!("[{}] closing {}", self.scene, entry.key);
        let node = mounted.node;
        let ticket = self.completions.next_ticket();
        self.in_flight = Some(InFlight::CloseAnimation {
            ticket,
            closing: Box::new(Closing {
                entry,
                mounted,
                beneath,
            }),
        });
        let done = self.completions.animation_done(ticket);
        self.backend.animator.play(node, AnimationClip::Close, done);
    }

    fn finish_animation(&mut self, ticket: Ticket) {
        match self.in_flight.take() {
            Some(InFlight::OpenAnimation {
                ticket: current,
                key,
                from,
            }) if current == ticket => self.finish_open(key, from),
            Some(InFlight::CloseAnimation {
                ticket: current,
                closing,
            }) if current == ticket => self.finish_close(*closing),
            other => {
                self.in_flight = other;
                debug!("[{}] stale animation completion {}", self.scene, ticket);
            }
        }
    }

    fn finish_close(&mut self, closing: Closing) {
        let Closing {
            entry,
            mut mounted,
            beneath,
        } = closing;
        let closed_id = entry.key.ui_id;
        let mut commands = Vec::new();

        let result = mounted
            .view
            .on_close(&mut ViewContext::new(entry.key, &mut commands));

        if let (Some(beneath), Some(top)) = (beneath, self.stack.last_mut()) {
            if top.key == beneath && !top.closed {
                if let Some(top_view) = top.mounted.as_mut() {
                    top_view.view.on_top(
                        &mut ViewContext::new(beneath, &mut commands),
                        closed_id,
                        result,
                    );
                }
            }
        }

        if let Some(delegate) = self.after_close.as_mut() {
            delegate(closed_id);
        }
        self.retire(&entry.descriptor, mounted);
        debug!("[{}] closed {}", self.scene, entry.key);

        self.apply_commands(commands);
    }

    fn close_to_ui_inner(&mut self, id: UiId, reopen_self: bool, args: Vec<ArgValue>) -> bool {
        let Some(index) = self.stack.iter().rposition(|entry| entry.key.ui_id == id) else {
            debug!("[{}] close_to_ui: {} is not open", self.scene, id);
            return false;
        };

        let bound = if reopen_self { index } else { index + 1 };
        let mut commands = Vec::new();
        let above = self.unwind_to(bound, &mut commands);
        self.refresh_visibility();

        if reopen_self {
            if let Err(err) = self.request_open(OpenRequest::new(id, args)) {
                warn!("[{}] reopen of {} failed: {}", self.scene, id, err);
            }
        } else if let Some((closed_id, result)) = above {
            if let Some(top) = self.stack.iter_mut().rev().find(|entry| !entry.closed) {
                let key = top.key;
                if let Some(mounted) = top.mounted.as_mut() {
                    mounted
                        .view
                        .on_top(&mut ViewContext::new(key, &mut commands), closed_id, result);
                }
            }
        }

        self.apply_commands(commands);
        true
    }

    /// Pops entries until `bound` remain, without animation.
    ///
    /// Returns the id and close result of the last entry popped.
    fn unwind_to(
        &mut self,
        bound: usize,
        commands: &mut Vec<UiCommand>,
    ) -> Option<(UiId, ArgValue)> {
        let mut last = None;
        while self.stack.len() > bound {
            let Some(mut entry) = self.stack.pop() else {
                break;
            };
            entry.closed = true;
            if let Some(blocker) = entry.blocker.take() {
                self.backend.canvas.destroy_blocker(blocker);
            }

            let result = match entry.mounted.take() {
                Some(mut mounted) => {
                    let result = mounted
                        .view
                        .on_close(&mut ViewContext::new(entry.key, commands));
                    self.retire(&entry.descriptor, mounted);
                    result
                }
                None => ArgValue::Null,
            };
            if let Some(delegate) = self.after_close.as_mut() {
                delegate(entry.key.ui_id);
            }
            debug!("[{}] unwound {}", self.scene, entry.key);
            last = Some((entry.key.ui_id, result));
        }
        last
    }

    //--- Internal Helpers -------------------------------------------------

    fn index_of(&self, key: ViewKey) -> Option<usize> {
        self.stack.iter().position(|entry| entry.key == key)
    }

    /// Moves a closed view to the cache, or destroys it.
    fn retire(&mut self, descriptor: &UiDescriptor, mounted: Mounted) {
        if descriptor.is_cacheable() {
            self.backend.canvas.detach(mounted.node);
            if let Some(previous) = self.cache.insert(descriptor.id, mounted) {
                self.destroy_mounted(previous);
            }
        } else {
            self.destroy_mounted(mounted);
        }
    }

    fn destroy_mounted(&mut self, mut mounted: Mounted) {
        mounted.view.release_assets();
        self.backend.canvas.destroy(mounted.node);
    }

    /// Applies the show-type rule to every loaded entry.
    fn refresh_visibility(&mut self) {
        let show_types: Vec<Option<ShowType>> = self
            .stack
            .iter()
            .map(|entry| entry.mounted.as_ref().map(|_| entry.descriptor.show_type))
            .collect();
        let visible = compute_visibility(&show_types, self.background_count);

        for (entry, visible) in self.stack.iter_mut().zip(visible) {
            entry.visible = visible;
            if let Some(mounted) = &entry.mounted {
                self.backend.canvas.set_active(mounted.node, visible);
            }
        }
    }
}

/// Acquires and releases an asset nobody will hold.
fn balance(asset: &AssetHandle) {
    asset.add_ref();
    asset.dec_ref();
}

impl fmt::Debug for UiManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiManager")
            .field("scene", &self.scene)
            .field("phase", &self.phase())
            .field("stack", &self.stack)
            .field("cached", &self.cache.keys().collect::<Vec<_>>())
            .field("queued_opens", &self.open_queue.len())
            .field("queued_closes", &self.close_queue.len())
            .finish_non_exhaustive()
    }
}
