// Per-page capture workflow: detect, let the user adjust, extract, validate.
// INE cards are scanned as a front/back pair.

use chrono::NaiveDate;
use image::DynamicImage;
use log::{debug, info};
use serde::Serialize;

use crate::models::{CornerPoints, DetectionResult, DocumentType, OcrResult, PersonalData};
use crate::processing::{Collaborators, ExtractionResult};
use crate::scanner::DocumentScanner;
use crate::utils::{CaptureError, Result};
use crate::validation::ExpiryValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerStage {
    Idle,
    Detecting,
    Adjusting,
    Highlighting,
    Extracting,
    Validating,
    WaitingForBack,
    Complete,
}

impl ScannerStage {
    pub fn can_transition_to(self, next: ScannerStage) -> bool {
        use ScannerStage::*;
        matches!(
            (self, next),
            (_, Adjusting)
                | (Idle, Detecting)
                | (Adjusting, Highlighting)
                | (Highlighting, Extracting)
                | (Extracting, Validating)
                | (Validating, WaitingForBack)
                | (Validating, Complete)
                | (WaitingForBack, Complete)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageSide {
    Front,
    Back,
}

/// One captured image and everything derived from it.
pub struct DocumentPage {
    side: PageSide,
    stage: ScannerStage,
    original: DynamicImage,
    detection: Option<DetectionResult>,
    corners: Option<CornerPoints>,
    extraction: Option<ExtractionResult>,
    result: Option<OcrResult>,
}

impl DocumentPage {
    fn new(original: DynamicImage, side: PageSide) -> Self {
        DocumentPage {
            side,
            stage: ScannerStage::Idle,
            original,
            detection: None,
            corners: None,
            extraction: None,
            result: None,
        }
    }

    pub fn side(&self) -> PageSide {
        self.side
    }

    pub fn stage(&self) -> ScannerStage {
        self.stage
    }

    pub fn original(&self) -> &DynamicImage {
        &self.original
    }

    pub fn detection(&self) -> Option<&DetectionResult> {
        self.detection.as_ref()
    }

    pub fn corners(&self) -> Option<&CornerPoints> {
        self.corners.as_ref()
    }

    pub fn extraction(&self) -> Option<&ExtractionResult> {
        self.extraction.as_ref()
    }

    pub fn result(&self) -> Option<&OcrResult> {
        self.result.as_ref()
    }

    fn advance(&mut self, next: ScannerStage) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(CaptureError::InvalidTransition(format!(
                "{:?} page cannot move from {:?} to {:?}",
                self.side, self.stage, next
            )));
        }
        debug!("{:?} page: {:?} -> {:?}", self.side, self.stage, next);
        self.stage = next;
        Ok(())
    }
}

/// Ordered pages for one document capture.
pub struct ScannerSession {
    document_type: DocumentType,
    expected: Option<PersonalData>,
    pages: Vec<DocumentPage>,
}

impl ScannerSession {
    pub fn new(document_type: DocumentType, expected: Option<PersonalData>) -> Self {
        ScannerSession {
            document_type,
            expected,
            pages: Vec::new(),
        }
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn pages(&self) -> &[DocumentPage] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Result<&DocumentPage> {
        self.pages
            .get(index)
            .ok_or_else(|| CaptureError::InvalidTransition(format!("No page at index {}", index)))
    }

    fn page_mut(&mut self, index: usize) -> Result<&mut DocumentPage> {
        self.pages
            .get_mut(index)
            .ok_or_else(|| CaptureError::InvalidTransition(format!("No page at index {}", index)))
    }

    fn waiting_front(&self) -> Option<usize> {
        self.pages
            .iter()
            .position(|p| p.side == PageSide::Front && p.stage == ScannerStage::WaitingForBack)
    }

    /// Add a captured image. A back page is only accepted while a front page
    /// waits for it.
    pub fn add_page(&mut self, image: DynamicImage, side: PageSide) -> Result<usize> {
        match side {
            PageSide::Back if self.waiting_front().is_none() => {
                return Err(CaptureError::InvalidTransition(
                    "No front page is waiting for its back side".to_string(),
                ));
            }
            PageSide::Back if self.pages.iter().any(|p| p.side == PageSide::Back) => {
                return Err(CaptureError::InvalidTransition("Back page already captured".to_string()));
            }
            PageSide::Front if !self.pages.is_empty() => {
                return Err(CaptureError::InvalidTransition("Front page already captured".to_string()));
            }
            _ => {}
        }

        self.pages.push(DocumentPage::new(image, side));
        info!("Added {:?} page ({} total)", side, self.pages.len());
        Ok(self.pages.len() - 1)
    }

    /// Detect corners and present them for adjustment. Low confidence or
    /// failed detections propose the full frame instead of blocking.
    pub fn detect(&mut self, index: usize, scanner: &DocumentScanner, collaborators: &Collaborators) -> Result<CornerPoints> {
        let page = self.page_mut(index)?;
        page.advance(ScannerStage::Detecting)?;

        let detection = scanner.detect_corners(&page.original, collaborators);
        let corners = scanner.proposed_corners(&page.original, &detection);
        page.detection = Some(detection);
        page.corners = Some(corners);

        page.advance(ScannerStage::Adjusting)?;
        Ok(corners)
    }

    /// Replace the proposed corners while the user is adjusting.
    pub fn adjust_corners(&mut self, index: usize, corners: CornerPoints) -> Result<()> {
        let page = self.page_mut(index)?;
        if page.stage != ScannerStage::Adjusting {
            return Err(CaptureError::InvalidTransition(format!(
                "Corners can only be adjusted in Adjusting, page is {:?}",
                page.stage
            )));
        }
        if !corners.is_simple_quad() {
            return Err(CaptureError::InvalidCorners(
                "Corners form a self-intersecting quadrilateral".to_string(),
            ));
        }
        page.corners = Some(corners);
        Ok(())
    }

    /// The user accepted the corners: highlight, then extract. A failed
    /// extraction returns the page to Adjusting.
    pub fn confirm(&mut self, index: usize, scanner: &DocumentScanner, collaborators: &Collaborators) -> Result<&ExtractionResult> {
        let page = self.page_mut(index)?;
        page.advance(ScannerStage::Highlighting)?;
        page.advance(ScannerStage::Extracting)?;

        let corners = page
            .corners
            .unwrap_or_else(|| CornerPoints::full_frame(page.original.width(), page.original.height()));
        let extraction = scanner.extract(&page.original, &corners, collaborators);

        if extraction.success {
            page.advance(ScannerStage::Validating)?;
        } else {
            page.advance(ScannerStage::Adjusting)?;
        }
        Ok(&*page.extraction.insert(extraction))
    }

    pub async fn validate(&mut self, index: usize, scanner: &DocumentScanner, collaborators: &Collaborators) -> Result<&OcrResult> {
        self.validate_on(index, scanner, collaborators, ExpiryValidator::today()).await
    }

    /// OCR and validate an extracted page as of `today`. On OCR failure the
    /// page stays in Validating so the call can be retried.
    pub async fn validate_on(
        &mut self,
        index: usize,
        scanner: &DocumentScanner,
        collaborators: &Collaborators,
        today: NaiveDate,
    ) -> Result<&OcrResult> {
        let document_type = self.document_type;
        let expected = self.expected.clone();

        let page = self.page(index)?;
        if page.stage != ScannerStage::Validating {
            return Err(CaptureError::InvalidTransition(format!(
                "Page must be extracted before validation, page is {:?}",
                page.stage
            )));
        }
        let extracted = page
            .extraction
            .as_ref()
            .and_then(|e| e.image.as_ref())
            .ok_or_else(|| CaptureError::InvalidTransition("Page has no extracted image".to_string()))?;

        let ocr = scanner.read_text(extracted, collaborators).await?;
        let hint = Some(document_type).filter(|t| *t != DocumentType::Unknown);
        let result = scanner.analyze_text(&ocr.text, ocr.confidence, hint, expected.as_ref(), today);

        let side = page.side;
        let is_ine = match document_type {
            DocumentType::Unknown => result.document_type == DocumentType::Ine,
            other => other == DocumentType::Ine,
        };

        match side {
            PageSide::Front if is_ine => self.page_mut(index)?.advance(ScannerStage::WaitingForBack)?,
            PageSide::Back => {
                if let Some(front) = self.waiting_front() {
                    self.pages[front].advance(ScannerStage::Complete)?;
                }
                self.page_mut(index)?.advance(ScannerStage::Complete)?;
            }
            PageSide::Front => self.page_mut(index)?.advance(ScannerStage::Complete)?,
        }

        let page = self.page_mut(index)?;
        info!("{:?} page validated: {:?}", side, result.outcome);
        Ok(&*page.result.insert(result))
    }

    /// User-initiated re-crop: any page goes back to Adjusting and loses its
    /// extraction and result.
    pub fn recrop(&mut self, index: usize) -> Result<()> {
        let page = self.page_mut(index)?;
        page.advance(ScannerStage::Adjusting)?;
        if page.corners.is_none() {
            page.corners = Some(CornerPoints::full_frame(page.original.width(), page.original.height()));
        }
        page.extraction = None;
        page.result = None;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        !self.pages.is_empty() && self.pages.iter().all(|p| p.stage == ScannerStage::Complete)
    }

    /// Results of every validated page, front first.
    pub fn results(&self) -> Vec<&OcrResult> {
        self.pages.iter().filter_map(|p| p.result.as_ref()).collect()
    }
}
