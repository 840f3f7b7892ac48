//! Persisted export defaults (`idrshot.json`)

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::encode::{DEFAULT_JPEG_QUALITY, DEFAULT_WEBP_QUALITY};
use crate::extract::ExtractionMode;
use crate::format::PictureFormat;

pub use crate::paths::{
    CONFIG_DIR_ENV, LOG_FILE, PathConfig, SETTINGS_FILE, config_file, data_file, ensure_dirs,
};

/// User-level defaults; every CLI flag overrides its field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub format: PictureFormat,
    /// Explicit quality for every lossy format; per-format defaults apply when unset
    pub quality: Option<u8>,
    pub jpeg_quality: u8,
    pub webp_quality: u8,
    /// Output directory; the source's own directory when unset
    pub output_dir: Option<PathBuf>,
    pub mode: ExtractionMode,
    pub count: usize,
    /// Export batches on the rayon pool
    pub parallel: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: PictureFormat::Jpg,
            quality: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            webp_quality: DEFAULT_WEBP_QUALITY,
            output_dir: None,
            mode: ExtractionMode::default(),
            count: 1,
            parallel: true,
        }
    }
}

impl ExportSettings {
    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let settings: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings {}", path.display()))?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings {}", path.display()))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }
}
