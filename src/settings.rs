use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::decoder::DEFAULT_PREVIEW_MAX_DIMENSION;
use crate::drawable::LARGE_IMAGE_THRESHOLD;
use crate::tiles::{
    DEFAULT_CACHE_BYTES, DEFAULT_RETAIN_RING, DEFAULT_TILE_SIZE, DEFAULT_WORKERS, TileConfig,
    normalize_tile_size,
};
use crate::viewer::ViewerConfig;
use crate::viewport::{Anchor, ScaleLimits, ScaleType};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "largeview";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Cell edge in source pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,

    /// Resident tile budget in bytes
    #[serde(default = "default_cache_bytes")]
    pub cache_bytes: usize,

    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Longest edge of the always-resident preview
    #[serde(default = "default_preview_max_dimension")]
    pub preview_max_dimension: u32,

    /// Images with both edges at or below this are decoded whole
    #[serde(default = "default_large_image_threshold")]
    pub large_image_threshold: u32,

    #[serde(default = "default_max_scale")]
    pub max_scale: f64,

    #[serde(default = "default_base_scale")]
    pub base_scale: f64,

    #[serde(default)]
    pub scale_type: ScaleType,

    #[serde(default)]
    pub anchor: Anchor,

    /// Cells kept around the visible ones when the budget is tight
    #[serde(default = "default_retain_ring")]
    pub retain_ring: u32,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

fn default_cache_bytes() -> usize {
    DEFAULT_CACHE_BYTES
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_preview_max_dimension() -> u32 {
    DEFAULT_PREVIEW_MAX_DIMENSION
}

fn default_large_image_threshold() -> u32 {
    LARGE_IMAGE_THRESHOLD
}

fn default_max_scale() -> f64 {
    ScaleLimits::DEFAULT_MAX_SCALE
}

fn default_base_scale() -> f64 {
    ScaleLimits::DEFAULT_BASE_SCALE
}

fn default_retain_ring() -> u32 {
    DEFAULT_RETAIN_RING
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            tile_size: default_tile_size(),
            cache_bytes: default_cache_bytes(),
            workers: default_workers(),
            preview_max_dimension: default_preview_max_dimension(),
            large_image_threshold: default_large_image_threshold(),
            max_scale: default_max_scale(),
            base_scale: default_base_scale(),
            scale_type: ScaleType::default(),
            anchor: Anchor::default(),
            retain_ring: default_retain_ring(),
        }
    }
}

#[must_use]
pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl Settings {
    /// Loads from the user config dir, falling back to defaults when the file
    /// is missing or unreadable.
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = preferred_config_path() else {
            warn!("Could not determine config directory, using default settings");
            return Self::default();
        };
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            debug!("Settings file {path:?} not found, using defaults");
            Self::default()
        }
    }

    /// Reads `path`. Read and parse errors are logged and yield defaults; an
    /// older file is migrated and written back.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!("Failed to read settings file {path:?}: {e}");
                return Self::default();
            }
        };

        match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");
                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    settings.save_to_path(path);
                }
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                Self::default()
            }
        }
    }

    /// Writes the commented YAML form to `path`, creating parent directories.
    /// Returns `false` (after logging) when anything fails.
    pub fn save_to_path(&self, path: &Path) -> bool {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create config directory {parent:?}: {e}");
                    return false;
                }
            }
        }

        match fs::write(path, generate_settings_yaml(self)) {
            Ok(()) => {
                debug!("Saved settings to {path:?}");
                true
            }
            Err(e) => {
                error!("Failed to save settings to {path:?}: {e}");
                false
            }
        }
    }

    #[must_use]
    pub fn tile_config(&self) -> TileConfig {
        TileConfig {
            tile_size: normalize_tile_size(self.tile_size),
            cache_bytes: self.cache_bytes,
            workers: self.workers.max(1),
            retain_ring: self.retain_ring,
        }
    }

    #[must_use]
    pub fn scale_limits(&self) -> ScaleLimits {
        ScaleLimits {
            base_scale: self.base_scale,
            max_scale: self.max_scale,
            ..ScaleLimits::default()
        }
    }

    #[must_use]
    pub fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig {
            tiles: self.tile_config(),
            large_image_threshold: self.large_image_threshold,
            limits: self.scale_limits(),
            scale_type: self.scale_type,
            anchor: self.anchor,
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Files written before versioning may carry any tile edge.
    settings.tile_size = normalize_tile_size(settings.tile_size);

    settings.version = CURRENT_VERSION;
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str(TILES_TEMPLATE);
    content.push_str(&format!("tile_size: {}\n", settings.tile_size));
    content.push_str(&format!("cache_bytes: {}\n", settings.cache_bytes));
    content.push_str(&format!("workers: {}\n", settings.workers));
    content.push_str(&format!(
        "preview_max_dimension: {}\n",
        settings.preview_max_dimension
    ));
    content.push_str(&format!(
        "large_image_threshold: {}\n",
        settings.large_image_threshold
    ));
    content.push_str(&format!("retain_ring: {}\n", settings.retain_ring));
    content.push('\n');
    content.push_str(VIEWPORT_TEMPLATE);
    content.push_str(&format!("max_scale: {:?}\n", settings.max_scale));
    content.push_str(&format!("base_scale: {:?}\n", settings.base_scale));
    content.push_str(&format!("scale_type: {}\n", settings.scale_type.name()));
    content.push_str(&format!("anchor: {}\n", settings.anchor.name()));

    content
}

const TILES_TEMPLATE: &str = r#"# ============================================================================
# Tiles
# ============================================================================
# tile_size is rounded down to a power of two (minimum 64).
# cache_bytes bounds decoded tiles; visible tiles may exceed it.
"#;

const VIEWPORT_TEMPLATE: &str = r#"# ============================================================================
# Viewport
# ============================================================================
# scale_type: origin | fit_width | fit_height | fit | fixed
# anchor: top_left | top_right | bottom_left | bottom_right | center
"#;
