//=========================================================================
// UI Descriptors
//=========================================================================
//
// Static per-UI-type configuration and its TOML representation.
//
//   background_count = 1
//
//   [[ui]]
//   id = 1
//   asset_path = "ui/bag"
//   prevent_touch = true
//   prevent_color = { r = 0, g = 0, b = 0, a = 150 }
//   show_type = "single"
//
// The manager holds the configuration as an `Arc<UiConfig>` snapshot;
// stack entries keep the `Arc<UiDescriptor>` they were opened with.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a UI type.
pub type UiId = u32;

//=== ShowType ============================================================

/// How a UI affects the visibility of the entries beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowType {
    /// Covers the screen: everything beneath is hidden.
    FullScreen,
    /// Overlay: everything beneath stays visible.
    Addition,
    /// Only this UI and the background entries are shown.
    #[default]
    Single,
}

//=== Color ===============================================================

/// RGBA tint of a touch blocker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

//=== UiLayer =============================================================

/// Conventional z-order bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UiLayer {
    Ui,
    Transition,
    Loading,
    Dialog,
    Toast,
}

impl UiLayer {
    pub const fn z_order(self) -> i32 {
        match self {
            Self::Ui => 0,
            Self::Transition => 200,
            Self::Loading => 300,
            Self::Dialog => 400,
            Self::Toast => 500,
        }
    }
}

//=== UiDescriptor ========================================================

/// Configuration of one UI type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiDescriptor {
    pub id: UiId,
    pub asset_path: String,
    pub bundle: Option<String>,
    /// Insert an input-blocking layer beneath the UI.
    pub prevent_touch: bool,
    /// Tint of the blocking layer; `None` keeps it invisible.
    pub prevent_color: Option<Color>,
    /// Tapping the UI background closes it.
    pub quick_close: bool,
    /// Keep closed instances for reuse instead of destroying them.
    pub cache: bool,
    pub show_type: ShowType,
    /// Explicit z-order; auto-assigned when absent.
    pub z_order: Option<i32>,
    pub multi_instance: bool,
}

impl Default for UiDescriptor {
    fn default() -> Self {
        Self::new(0, "")
    }
}

impl UiDescriptor {
    pub fn new(id: UiId, asset_path: impl Into<String>) -> Self {
        Self {
            id,
            asset_path: asset_path.into(),
            bundle: None,
            prevent_touch: false,
            prevent_color: None,
            quick_close: false,
            cache: false,
            show_type: ShowType::Single,
            z_order: None,
            multi_instance: false,
        }
    }

    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    pub fn with_prevent_touch(mut self, color: Option<Color>) -> Self {
        self.prevent_touch = true;
        self.prevent_color = color;
        self
    }

    pub fn with_quick_close(mut self) -> Self {
        self.quick_close = true;
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn with_show_type(mut self, show_type: ShowType) -> Self {
        self.show_type = show_type;
        self
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.z_order = Some(z_order);
        self
    }

    pub fn with_layer(self, layer: UiLayer) -> Self {
        self.with_z_order(layer.z_order())
    }

    pub fn with_multi_instance(mut self) -> Self {
        self.multi_instance = true;
        self
    }

    /// Closed instances go to the cache only for single-instance UIs.
    pub fn is_cacheable(&self) -> bool {
        self.cache && !self.multi_instance
    }
}

//=== UiConfig ============================================================

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read UI config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid UI config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("UI id {0} is configured more than once")]
    DuplicateId(UiId),
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    background_count: Option<usize>,
    #[serde(default)]
    ui: Vec<UiDescriptor>,
}

/// Every UI descriptor known to a manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiConfig {
    descriptors: BTreeMap<UiId, Arc<UiDescriptor>>,
    background_count: Option<usize>,
}

impl UiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, descriptor: UiDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn with_background_count(mut self, count: usize) -> Self {
        self.background_count = Some(count);
        self
    }

    /// Adds or replaces a descriptor, returning the previous one.
    pub fn insert(&mut self, descriptor: UiDescriptor) -> Option<Arc<UiDescriptor>> {
        self.descriptors.insert(descriptor.id, Arc::new(descriptor))
    }

    pub fn get(&self, id: UiId) -> Option<&Arc<UiDescriptor>> {
        self.descriptors.get(&id)
    }

    pub fn contains(&self, id: UiId) -> bool {
        self.descriptors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = UiId> + '_ {
        self.descriptors.keys().copied()
    }

    pub fn background_count(&self) -> Option<usize> {
        self.background_count
    }

    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(source).map_err(|err| {
            error!("UI config parse error: {}", err);
            ConfigError::Parse(err)
        })?;

        let mut config = Self {
            descriptors: BTreeMap::new(),
            background_count: raw.background_count,
        };
        for descriptor in raw.ui {
            let id = descriptor.id;
            if config.insert(descriptor).is_some() {
                error!("UI config rejected: duplicate id {}", id);
                return Err(ConfigError::DuplicateId(id));
            }
        }

        debug!("parsed UI config with {} descriptor(s)", config.len());
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| {
            error!("cannot read UI config {}: {}", path.display(), source);
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_toml_str(&source)
    }
}

//=========================================================================
// Tests
//=========================================================================
