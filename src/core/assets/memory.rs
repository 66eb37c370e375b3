//=========================================================================
// In-Memory Assets
//=========================================================================
//
// Headless implementations of the asset contracts, used when no engine
// is attached (tools, tests).
//
//   SharedAsset   ─ atomic ref count plus acquire / release totals
//   MemoryLoader  ─ serves registered paths, immediately or on demand
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::{Asset, AssetHandle, AssetLoader, LoadDone, LoadError, LoadRequest, ProgressFn};

//=== SharedAsset =========================================================

/// Asset with an atomic reference count.
#[derive(Debug)]
pub struct SharedAsset {
    path: String,
    refs: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl SharedAsset {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            refs: AtomicUsize::new(0),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    /// Total `add_ref` calls so far.
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::Acquire)
    }

    /// Total `dec_ref` calls so far.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }
}

impl Asset for SharedAsset {
    fn path(&self) -> &str {
        &self.path
    }

    fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
        self.acquired.fetch_add(1, Ordering::AcqRel);
    }

    fn dec_ref(&self) {
        self.released.fetch_add(1, Ordering::AcqRel);
        let underflow = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| refs.checked_sub(1))
            .is_err();
        if underflow {
            warn!("dec_ref on '{}' with no outstanding references", self.path);
        }
    }

    fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

//=== MemoryLoader ========================================================

type PendingLoad = (LoadRequest, Option<ProgressFn>, LoadDone);

#[derive(Default)]
struct LoaderState {
    assets: HashMap<String, Arc<SharedAsset>>,
    failures: HashMap<String, String>,
    deferred: bool,
    pending: VecDeque<PendingLoad>,
    loads: HashMap<String, usize>,
}

/// Loader serving assets registered with [`insert`](Self::insert).
///
/// Clones share state, so a caller can keep a handle to complete
/// deferred loads after giving the loader away.
#[derive(Clone, Default)]
pub struct MemoryLoader {
    state: Rc<RefCell<LoaderState>>,
}

impl MemoryLoader {
    /// Loader that completes every load inside `load`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that holds loads until [`complete_next`](Self::complete_next)
    /// or [`complete_all`](Self::complete_all).
    pub fn deferred() -> Self {
        let loader = Self::default();
        loader.state.borrow_mut().deferred = true;
        loader
    }

    /// Registers an asset under `path` and returns it.
    pub fn insert(&self, path: impl Into<String>) -> Arc<SharedAsset> {
        let path = path.into();
        let asset = Arc::new(SharedAsset::new(path.clone()));
        self.state
            .borrow_mut()
            .assets
            .insert(path, Arc::clone(&asset));
        asset
    }

    /// Makes every load of `path` fail with `reason`.
    pub fn fail(&self, path: impl Into<String>, reason: impl Into<String>) {
        self.state
            .borrow_mut()
            .failures
            .insert(path.into(), reason.into());
    }

    /// Number of `load` calls made for `path`.
    pub fn load_count(&self, path: &str) -> usize {
        self.state.borrow().loads.get(path).copied().unwrap_or(0)
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Completes the oldest held load. Returns false if none was held.
    pub fn complete_next(&self) -> bool {
        let next = self.state.borrow_mut().pending.pop_front();
        match next {
            Some((request, progress, done)) => {
                self.finish(request, progress, done);
                true
            }
            None => false,
        }
    }

    /// Completes every held load; returns how many were completed.
    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }

    fn resolve(&self, request: &LoadRequest) -> Result<AssetHandle, LoadError> {
        let state = self.state.borrow();
        if let Some(reason) = state.failures.get(&request.path) {
            return Err(LoadError::Failed {
                path: request.path.clone(),
                reason: reason.clone(),
            });
        }
        match state.assets.get(&request.path) {
            Some(asset) => {
                let handle: AssetHandle = Arc::clone(asset) as AssetHandle;
                Ok(handle)
            }
            None => Err(LoadError::NotFound {
                path: request.path.clone(),
            }),
        }
    }

    fn finish(&self, request: LoadRequest, progress: Option<ProgressFn>, done: LoadDone) {
        let result = self.resolve(&request);
        if let Some(progress) = progress {
            progress(1, 1);
        }
        debug!("memory load of '{}' finished (ok: {})", request.path, result.is_ok());
        done.complete(result);
    }
}

impl AssetLoader for MemoryLoader {
    fn load(&mut self, request: LoadRequest, progress: Option<ProgressFn>, done: LoadDone) {
        let deferred = {
            let mut state = self.state.borrow_mut();
            *state.loads.entry(request.path.clone()).or_default() += 1;
            state.deferred
        };

        if deferred {
            self.state
                .borrow_mut()
                .pending
                .push_back((request, progress, done));
        } else {
            self.finish(request, progress, done);
        }
    }
}

//=========================================================================
// Tests
//=========================================================================
