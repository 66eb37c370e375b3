//=========================================================================
// Asset Keeper
//=========================================================================
//
// Tracks the assets a view holds. Each distinct asset is add_ref'd once
// when cached and dec_ref'd once on release (or when the keeper drops).
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

use log::debug;

//=== Internal Dependencies ===============================================

use super::AssetHandle;

//=== AssetKeeper =========================================================

#[derive(Default)]
pub struct AssetKeeper {
    assets: Vec<AssetHandle>,
}

impl AssetKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds a reference to `asset`. Returns false if it was already held.
    pub fn cache_asset(&mut self, asset: AssetHandle) -> bool {
        if self.contains(&asset) {
            return false;
        }
        asset.add_ref();
        self.assets.push(asset);
        true
    }

    /// Releases every held asset.
    pub fn release_assets(&mut self) {
        if self.assets.is_empty() {
            return;
        }
        debug!("releasing {} asset(s)", self.assets.len());
        for asset in self.assets.drain(..) {
            asset.dec_ref();
        }
    }

    pub fn contains(&self, asset: &AssetHandle) -> bool {
        self.assets.iter().any(|held| Arc::ptr_eq(held, asset))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Drop for AssetKeeper {
    fn drop(&mut self) {
        self.release_assets();
    }
}

impl std::fmt::Debug for AssetKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.assets.iter().map(|asset| asset.path()))
            .finish()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::SharedAsset;

    fn asset(path: &str) -> AssetHandle {
        Arc::new(SharedAsset::new(path))
    }

    #[test]
    fn caches_each_asset_once() {
        let prefab = asset("ui/bag");
        let mut keeper = AssetKeeper::new();

        assert!(keeper.cache_asset(Arc::clone(&prefab)));
        assert!(!keeper.cache_asset(Arc::clone(&prefab)));

        assert_eq!(keeper.len(), 1);
        assert_eq!(prefab.ref_count(), 1);
    }

    #[test]
    fn release_balances_refs() {
        let a = asset("a");
        let b = asset("b");
        let mut keeper = AssetKeeper::new();
        keeper.cache_asset(Arc::clone(&a));
        keeper.cache_asset(Arc::clone(&b));

        keeper.release_assets();

        assert!(keeper.is_empty());
        assert_eq!(a.ref_count(), 0);
        assert_eq!(b.ref_count(), 0);
    }

    #[test]
    fn drop_releases() {
        let prefab = asset("ui/head");
        {
            let mut keeper = AssetKeeper::new();
            keeper.cache_asset(Arc::clone(&prefab));
            assert!(keeper.contains(&prefab));
        }
        assert_eq!(prefab.ref_count(), 0);
    }
}
