//=========================================================================
// Asset Layer
//=========================================================================
//
// Contracts with the engine's asset pipeline plus reference bookkeeping.
//
// Architecture:
//   AssetLoader::load(request, progress, LoadDone)
//                                           │
//                 complete(Ok(AssetHandle)) ┘  (exactly once)
//
//   AssetKeeper  ─ add_ref once per distinct asset, dec_ref on release
//
// Every acquire is balanced by exactly one release, or handed to a view's
// keeper which releases it when the view is destroyed.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

//=== Submodules ==========================================================

mod keeper;
mod memory;

pub use keeper::AssetKeeper;
pub use memory::{MemoryLoader, SharedAsset};

//=== Asset Contracts =====================================================

/// A reference-counted engine asset.
pub trait Asset: Send + Sync {
    /// Path the asset was loaded from.
    fn path(&self) -> &str;
    fn add_ref(&self);
    fn dec_ref(&self);
    fn ref_count(&self) -> usize;
}

/// Shared handle to a loaded asset.
pub type AssetHandle = Arc<dyn Asset>;

/// Progress callback: `(finished, total)` items.
pub type ProgressFn = Rc<dyn Fn(u32, u32)>;

/// What to load, and from which bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub path: String,
    pub bundle: Option<String>,
}

impl LoadRequest {
    pub fn new(path: impl Into<String>, bundle: Option<String>) -> Self {
        Self {
            path: path.into(),
            bundle,
        }
    }
}

/// Asset load failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("asset '{path}' not found")]
    NotFound { path: String },

    #[error("failed to load '{path}': {reason}")]
    Failed { path: String, reason: String },

    #[error("load of '{path}' was dropped without completing")]
    Abandoned { path: String },
}

/// Asynchronous asset loader provided by the engine.
pub trait AssetLoader {
    /// Starts loading `request`; `done` must eventually be completed.
    fn load(&mut self, request: LoadRequest, progress: Option<ProgressFn>, done: LoadDone);
}

//=== LoadDone ============================================================

type LoadCallback = Box<dyn FnOnce(Result<AssetHandle, LoadError>) + Send>;

/// One-shot completion handle for an asset load.
///
/// Consumed by [`complete`](Self::complete). Dropping it uncompleted
/// reports [`LoadError::Abandoned`].
pub struct LoadDone {
    path: String,
    callback: Option<LoadCallback>,
}

impl LoadDone {
    pub fn new<F>(path: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce(Result<AssetHandle, LoadError>) + Send + 'static,
    {
        Self {
            path: path.into(),
            callback: Some(Box::new(callback)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn complete(mut self, result: Result<AssetHandle, LoadError>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for LoadDone {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Err(LoadError::Abandoned {
                path: std::mem::take(&mut self.path),
            }));
        }
    }
}

impl fmt::Debug for LoadDone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadDone")
            .field("path", &self.path)
            .field("completed", &self.callback.is_none())
            .finish()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn complete_delivers_result_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let done = LoadDone::new("ui/bag", move |result| {
            sink.lock().unwrap().push(result.map(|asset| asset.path().to_string()));
        });

        let asset: AssetHandle = Arc::new(SharedAsset::new("ui/bag"));
        done.complete(Ok(asset));

        assert_eq!(*seen.lock().unwrap(), vec![Ok("ui/bag".to_string())]);
    }

    #[test]
    fn dropping_reports_abandoned() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        drop(LoadDone::new("ui/head", move |result| {
            *sink.lock().unwrap() = Some(result.err());
        }));

        assert_eq!(
            *seen.lock().unwrap(),
            Some(Some(LoadError::Abandoned {
                path: "ui/head".to_string()
            }))
        );
    }
}
