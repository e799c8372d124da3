//! Pipeline configuration.
//!
//! Every section has defaults, so a config file only needs the values it
//! overrides. The tessdata path falls back to `TESSDATA_PREFIX`.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::processing::corrections::CorrectionTables;
use crate::utils::{CaptureError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub detection: DetectionConfig,
    pub preprocess: PreprocessConfig,
    pub ocr: OcrConfig,
    pub validation: ValidationConfig,
    pub corrections: CorrectionTables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_area_ratio: f32,
    pub max_area_ratio: f32,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    /// Below this confidence the user is asked to place corners manually.
    pub manual_adjust_threshold: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            min_area_ratio: 0.1,
            max_area_ratio: 0.95,
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 3.0,
            manual_adjust_threshold: 0.5,
            canny_low: 20.0,
            canny_high: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub max_upscale: f32,
    pub adaptive_block_size: u32,
    pub adaptive_constant: i32,
    pub morph_kernel: u32,
    /// Fraction of the document height cropped from the bottom for the MRZ pass.
    pub mrz_band_ratio: f32,
    pub mrz_min_height: u32,
    pub mrz_min_upscale: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            min_width: 1000,
            min_height: 600,
            max_upscale: 2.0,
            adaptive_block_size: 21,
            adaptive_constant: 8,
            morph_kernel: 2,
            mrz_band_ratio: 0.35,
            mrz_min_height: 150,
            mrz_min_upscale: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub general_language: String,
    pub mrz_language: String,
    pub tessdata_path: Option<String>,
    pub mrz_whitelist: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            general_language: "spa+eng".to_string(),
            mrz_language: "eng".to_string(),
            tessdata_path: None,
            mrz_whitelist: "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789<".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Overall confidence must be strictly above this value.
    pub min_confidence: f32,
    pub ine_aspect_ratio: (f32, f32),
    pub passport_aspect_ratio: (f32, f32),
    /// Allowed difference between an OCR'd MRZ line and the layout length.
    pub line_length_tolerance: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            min_confidence: 0.40,
            ine_aspect_ratio: (1.45, 1.75),
            passport_aspect_ratio: (1.30, 1.55),
            line_length_tolerance: 2,
        }
    }
}

impl CaptureConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::ConfigError(format!("Failed to read {:?}: {}", path, e)))?;
        let mut config: CaptureConfig = serde_json::from_str(&raw)
            .map_err(|e| CaptureError::ConfigError(format!("Invalid config {:?}: {}", path, e)))?;
        config.apply_env();
        config.check()?;
        info!("Loaded capture config from {:?}", path);
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = CaptureConfig::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if self.ocr.tessdata_path.is_none() {
            self.ocr.tessdata_path = std::env::var("TESSDATA_PREFIX").ok();
        }
    }

    fn check(&self) -> Result<()> {
        let band = self.preprocess.mrz_band_ratio;
        if !(0.05..=0.6).contains(&band) {
            return Err(CaptureError::ConfigError(format!(
                "mrz_band_ratio must be between 0.05 and 0.6, got {}",
                band
            )));
        }
        if self.preprocess.adaptive_block_size % 2 == 0 {
            return Err(CaptureError::ConfigError(
                "adaptive_block_size must be odd".to_string(),
            ));
        }
        if self.preprocess.morph_kernel == 0 {
            return Err(CaptureError::ConfigError("morph_kernel must be positive".to_string()));
        }
        Ok(())
    }
}
