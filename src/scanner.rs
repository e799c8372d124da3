use chrono::NaiveDate;
use image::DynamicImage;
use log::{info, warn};

use crate::config::CaptureConfig;
use crate::models::*;
use crate::processing::extractors::detect_document_type;
use crate::processing::ocr::{run_dual_pass, OcrText};
use crate::processing::{
    Collaborators, CornerDetector, ExtractionResult, FieldCorrection, LabelExtractor, MrzDecoder, OcrPreprocessor,
    PerspectiveExtractor,
};
use crate::utils::Result;
use crate::validation::{
    compare_fields, decide, overall_confidence, ExpiryValidator, FormatValidator, StructuralValidator,
};

/// Runs one page through detection, rectification, OCR and validation.
/// Holds no per-page state; every call is independent.
pub struct DocumentScanner {
    config: CaptureConfig,
    corner_detector: CornerDetector,
    extractor: PerspectiveExtractor,
    preprocessor: OcrPreprocessor,
    decoder: MrzDecoder,
    labels: LabelExtractor,
    structure: StructuralValidator,
}

impl DocumentScanner {
    pub fn new(config: CaptureConfig) -> Self {
        DocumentScanner {
            corner_detector: CornerDetector::new(config.detection.clone()),
            extractor: PerspectiveExtractor::new(),
            preprocessor: OcrPreprocessor::new(config.preprocess.clone()),
            decoder: MrzDecoder::new(config.corrections.clone()),
            labels: LabelExtractor::new(config.corrections.clone()),
            structure: StructuralValidator::new(config.corrections.clone(), config.validation.clone()),
            config,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn detect_corners(&self, image: &DynamicImage, collaborators: &Collaborators) -> DetectionResult {
        self.corner_detector.detect(image, collaborators)
    }

    /// Detected corners when trustworthy, otherwise the full frame so the
    /// user always has something to adjust.
    pub fn proposed_corners(&self, image: &DynamicImage, detection: &DetectionResult) -> CornerPoints {
        match detection.corners {
            Some(corners) if !self.corner_detector.needs_manual_adjustment(detection) => corners,
            _ => CornerPoints::full_frame(image.width(), image.height()),
        }
    }

    pub fn extract(&self, image: &DynamicImage, corners: &CornerPoints, collaborators: &Collaborators) -> ExtractionResult {
        self.extractor.extract(image, corners, collaborators)
    }

    /// Preprocess the rectified page and run both OCR passes. Fails fast
    /// when the OCR engine is not loaded.
    pub async fn read_text(&self, page: &DynamicImage, collaborators: &Collaborators) -> Result<OcrText> {
        let engine = collaborators.ocr.require()?;

        let general = self.preprocessor.general(page, collaborators);
        let mrz_zone = self.preprocessor.mrz_zone(page, collaborators);

        run_dual_pass(engine.as_ref(), &general, &mrz_zone, &self.config.ocr).await
    }

    pub fn try_decode_mrz(&self, text: &str) -> Result<MrzResult> {
        self.decoder.try_decode(text)
    }

    pub fn validate_structure(&self, text: &str, width: u32, height: u32, hint: Option<DocumentType>) -> DocumentValidationResult {
        self.structure.validate(text, width, height, hint)
    }

    /// Turn OCR text into the final result for one attempt.
    pub fn analyze_text(
        &self,
        text: &str,
        ocr_confidence: f32,
        hint: Option<DocumentType>,
        expected: Option<&PersonalData>,
        today: NaiveDate,
    ) -> OcrResult {
        let mrz = self.decoder.decode(text);

        let document_type = match hint {
            Some(hint) if hint != DocumentType::Unknown => hint,
            _ if mrz.success => mrz.document_type,
            _ => detect_document_type(text),
        };

        let labels = self.labels.extract(text, document_type);
        let fields = FieldCorrection::merge(&labels, &mrz);

        let rules = DocumentRules::for_document(document_type);
        let coverage = FormatValidator::validate(&fields, &rules);
        let comparisons = expected
            .map(|expected| compare_fields(&fields, expected, document_type))
            .unwrap_or_default();

        // The printed validity can disagree with the MRZ; either one expiring
        // is enough.
        let expiry = ExpiryValidator::check(
            &[mrz.expiry_date.as_deref(), labels.expiry_date.as_deref()],
            today,
        );

        let confidence = overall_confidence(ocr_confidence, mrz.confidence, coverage.found_ratio());
        let verdict = decide(
            confidence,
            self.config.validation.min_confidence,
            &coverage,
            &rules,
            &comparisons,
            &expiry,
        );

        if verdict.is_valid {
            info!("{} document validated with confidence {:.2}", document_type, confidence);
        } else {
            warn!("{} document rejected ({:?}): {}", document_type, verdict.outcome, verdict.message);
        }

        OcrResult {
            document_type,
            raw_text: text.to_string(),
            ocr_confidence,
            confidence: verdict.confidence,
            mrz,
            fields,
            comparisons,
            found_fields: coverage.found_fields,
            missing_fields: coverage.missing_fields,
            is_valid: verdict.is_valid,
            is_expired: verdict.is_expired,
            outcome: verdict.outcome,
            message: verdict.message,
        }
    }

    /// OCR a rectified page and validate it against today's date.
    pub async fn scan_page(
        &self,
        page: &DynamicImage,
        hint: Option<DocumentType>,
        expected: Option<&PersonalData>,
        collaborators: &Collaborators,
    ) -> Result<OcrResult> {
        let ocr = self.read_text(page, collaborators).await?;
        Ok(self.analyze_text(&ocr.text, ocr.confidence, hint, expected, ExpiryValidator::today()))
    }
}

impl Default for DocumentScanner {
    fn default() -> Self {
        DocumentScanner::new(CaptureConfig::default())
    }
}
