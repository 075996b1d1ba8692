//! Engine configuration.

use crate::error::{RedactorError, RedactorResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// OCR renders never go below this resolution.
pub const MIN_OCR_DPI: f32 = 300.0;

/// Upper bound on OCR pool size.
pub const DEFAULT_MAX_POOL_SIZE: usize = 4;

/// Which pages get OCR during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// OCR only pages whose native text layer is empty.
    #[default]
    Auto,
    /// Never OCR; native text only.
    Native,
    /// OCR every page in addition to its native text.
    Ocr,
}

/// Tunables for scanning and redaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resolution of OCR renders; clamped to at least [`MIN_OCR_DPI`].
    pub ocr_dpi: f32,
    /// Resolution of the orientation detection render.
    pub orientation_dpi: f32,
    /// Orientation estimates below this confidence are treated as upright.
    pub orientation_min_confidence: f32,
    /// Pool size is `min(available parallelism, max_pool_size)`.
    pub max_pool_size: usize,
    pub scan_mode: ScanMode,
    /// Target resolution of redacted page rasters.
    pub redaction_dpi: f32,
    /// Neither dimension of a redacted raster exceeds this many pixels.
    pub max_render_dimension: u32,
    /// Smallest accepted manual box, in display pixels per side.
    pub min_manual_size: f32,
    /// Added around every automatic match box, in user units.
    pub bbox_padding: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ocr_dpi: MIN_OCR_DPI,
            orientation_dpi: 150.0,
            orientation_min_confidence: 0.0,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            scan_mode: ScanMode::Auto,
            redaction_dpi: 200.0,
            max_render_dimension: 4000,
            min_manual_size: 5.0,
            bbox_padding: 0.0,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON configuration file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> RedactorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RedactorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_ocr_dpi(mut self, dpi: f32) -> Self {
        self.ocr_dpi = dpi;
        self
    }

    pub fn with_scan_mode(mut self, mode: ScanMode) -> Self {
        self.scan_mode = mode;
        self
    }

    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    pub fn with_redaction_dpi(mut self, dpi: f32) -> Self {
        self.redaction_dpi = dpi;
        self
    }

    pub fn with_max_render_dimension(mut self, pixels: u32) -> Self {
        self.max_render_dimension = pixels;
        self
    }

    pub fn with_bbox_padding(mut self, padding: f32) -> Self {
        self.bbox_padding = padding;
        self
    }

    /// OCR resolution actually used.
    pub fn effective_ocr_dpi(&self) -> f32 {
        self.ocr_dpi.max(MIN_OCR_DPI)
    }

    /// Number of OCR engine instances to spawn.
    pub fn pool_size(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        available.min(self.max_pool_size).max(1)
    }

    pub fn validate(&self) -> RedactorResult<()> {
        if self.max_pool_size == 0 {
            return Err(RedactorError::invalid_input(
                "max_pool_size",
                "must be at least 1",
            ));
        }
        if self.orientation_dpi <= 0.0 || self.redaction_dpi <= 0.0 {
            return Err(RedactorError::invalid_input(
                "dpi",
                "render resolutions must be positive",
            ));
        }
        if self.max_render_dimension == 0 {
            return Err(RedactorError::invalid_input(
                "max_render_dimension",
                "must be at least 1 pixel",
            ));
        }
        if self.min_manual_size < 0.0 || self.bbox_padding < 0.0 {
            return Err(RedactorError::invalid_input(
                "min_manual_size",
                "sizes must not be negative",
            ));
        }
        Ok(())
    }
}
