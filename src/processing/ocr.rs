use std::io::Write;

use async_trait::async_trait;
use image::DynamicImage;
use log::{debug, info, warn};
use tempfile::NamedTempFile;
use tesseract::Tesseract;

use crate::config::OcrConfig;
use crate::processing::image::encode_png;
use crate::utils::{CaptureError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegMode {
    /// Let the engine find the text layout.
    Auto,
    /// The image is one uniform block of text.
    SingleBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrOptions {
    pub language: String,
    pub page_seg_mode: PageSegMode,
    pub whitelist: Option<String>,
    pub use_dictionary: bool,
}

impl OcrOptions {
    /// Whole-document pass: Spanish + English, default layout analysis.
    pub fn general(config: &OcrConfig) -> Self {
        OcrOptions {
            language: config.general_language.clone(),
            page_seg_mode: PageSegMode::Auto,
            whitelist: None,
            use_dictionary: true,
        }
    }

    pub fn mrz(config: &OcrConfig) -> Self {
        OcrOptions {
            language: config.mrz_language.clone(),
            page_seg_mode: PageSegMode::SingleBlock,
            whitelist: Some(config.mrz_whitelist.clone()),
            use_dictionary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrText {
    pub text: String,
    /// Mean word confidence in [0, 1].
    pub confidence: f32,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn recognize(&self, image: &DynamicImage, options: &OcrOptions) -> Result<OcrText>;
}

/// Tesseract adapter. A fresh engine is created for every call, so
/// concurrent passes never share engine state.
pub struct TesseractEngine {
    datapath: Option<String>,
}

impl TesseractEngine {
    pub fn new(datapath: Option<String>) -> Self {
        TesseractEngine { datapath }
    }

    /// Check that the language data can be loaded before declaring the engine ready.
    pub async fn probe(datapath: Option<String>, language: &str) -> Result<Self> {
        let language = language.to_string();
        let path = datapath.clone();
        tokio::task::spawn_blocking(move || {
            Tesseract::new(path.as_deref(), Some(language.as_str()))
                .map(|_| ())
                .map_err(|e| CaptureError::CollaboratorUnavailable(format!("Tesseract init error ({}): {}", language, e)))
        })
        .await
        .map_err(|e| CaptureError::OcrError(format!("Tesseract probe task failed: {}", e)))??;

        info!("Tesseract ready (tessdata: {:?})", datapath);
        Ok(TesseractEngine::new(datapath))
    }

    /// Variables applied after init. The dictionaries themselves
    /// (`load_system_dawg`, `load_freq_dawg`) are init-only and the tesseract
    /// crate exposes no init-time variables, so a pass without dictionary
    /// only drops the penalty for non-dictionary words.
    fn runtime_variables(options: &OcrOptions) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();
        if let Some(whitelist) = &options.whitelist {
            vars.push(("tessedit_char_whitelist", whitelist.clone()));
        }
        if !options.use_dictionary {
            vars.push(("language_model_penalty_non_dict_word", "0".to_string()));
            vars.push(("language_model_penalty_non_freq_dict_word", "0".to_string()));
        }
        vars
    }

    fn run(datapath: Option<&str>, png: &[u8], options: &OcrOptions) -> Result<OcrText> {
        let mut temp_file = NamedTempFile::new()
            .map_err(|e| CaptureError::OcrError(format!("Failed to create temp file: {}", e)))?;
        temp_file
            .write_all(png)
            .map_err(|e| CaptureError::OcrError(format!("Failed to write to temp file: {}", e)))?;
        let image_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| CaptureError::OcrError("Failed to convert path to string".to_string()))?;

        let mut tess = Tesseract::new(datapath, Some(options.language.as_str()))
            .map_err(|e| CaptureError::OcrError(format!("Tesseract init error: {}", e)))?;

        for (name, value) in Self::runtime_variables(options) {
            tess = tess
                .set_variable(name, &value)
                .map_err(|e| CaptureError::OcrError(format!("Tesseract set variable error ({}): {}", name, e)))?;
        }

        tess.set_page_seg_mode(match options.page_seg_mode {
            PageSegMode::Auto => tesseract::PageSegMode::PsmAuto,
            PageSegMode::SingleBlock => tesseract::PageSegMode::PsmSingleBlock,
        });

        let mut tess = tess
            .set_image(image_path)
            .map_err(|e| CaptureError::OcrError(format!("Tesseract set image error: {}", e)))?;
        let text = tess
            .get_text()
            .map_err(|e| CaptureError::OcrError(format!("Tesseract error: {}", e)))?;
        let confidence = (tess.mean_text_conf().clamp(0, 100) as f32) / 100.0;

        Ok(OcrText { text, confidence })
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &DynamicImage, options: &OcrOptions) -> Result<OcrText> {
        let png = encode_png(image)?;
        let datapath = self.datapath.clone();
        let options = options.clone();

        tokio::task::spawn_blocking(move || Self::run(datapath.as_deref(), &png, &options))
            .await
            .map_err(|e| CaptureError::OcrError(format!("OCR task failed: {}", e)))?
    }
}

/// Run the general and MRZ passes concurrently and combine them.
pub async fn run_dual_pass(
    engine: &dyn OcrEngine,
    general_image: &DynamicImage,
    mrz_image: &DynamicImage,
    config: &OcrConfig,
) -> Result<OcrText> {
    let general_options = OcrOptions::general(config);
    let mrz_options = OcrOptions::mrz(config);

    let (general, mrz) = tokio::join!(
        engine.recognize(general_image, &general_options),
        engine.recognize(mrz_image, &mrz_options)
    );

    match (general, mrz) {
        (Ok(general), Ok(mrz)) => {
            debug!(
                "OCR passes done: general {:.2}, MRZ {:.2}",
                general.confidence, mrz.confidence
            );
            Ok(OcrText {
                text: format!("{}\n{}", general.text, mrz.text),
                confidence: general.confidence.max(mrz.confidence),
            })
        }
        (Ok(general), Err(e)) => {
            warn!("MRZ OCR pass failed, using general pass only: {}", e);
            Ok(general)
        }
        (Err(e), Ok(mrz)) => {
            warn!("General OCR pass failed, using MRZ pass only: {}", e);
            Ok(mrz)
        }
        (Err(general), Err(mrz)) => Err(CaptureError::OcrError(format!(
            "Both OCR passes failed: {}; {}",
            general, mrz
        ))),
    }
}
