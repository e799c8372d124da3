use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use log::{info, warn};

use crate::models::CornerPoints;
use crate::processing::collaborator::Collaborators;
use crate::processing::image::encode_png;
use crate::utils::{CaptureError, Result};

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub success: bool,
    pub image: Option<DynamicImage>,
    /// PNG bytes of the rectified document.
    pub encoded: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub message: String,
}

impl ExtractionResult {
    fn failed(message: impl Into<String>) -> Self {
        ExtractionResult {
            success: false,
            image: None,
            encoded: None,
            width: 0,
            height: 0,
            message: message.into(),
        }
    }

    pub fn encoded_base64(&self) -> Option<String> {
        self.encoded.as_ref().map(|bytes| STANDARD.encode(bytes))
    }
}

/// Rectifies the document region delimited by four corners.
#[derive(Debug, Default)]
pub struct PerspectiveExtractor;

impl PerspectiveExtractor {
    pub fn new() -> Self {
        PerspectiveExtractor
    }

    /// Never fails past this boundary: every problem is reported as
    /// `success == false`.
    pub fn extract(&self, image: &DynamicImage, corners: &CornerPoints, collaborators: &Collaborators) -> ExtractionResult {
        match self.try_extract(image, corners, collaborators) {
            Ok(result) => result,
            Err(e) => {
                warn!("Perspective extraction failed: {}", e);
                ExtractionResult::failed(e.to_string())
            }
        }
    }

    fn try_extract(&self, image: &DynamicImage, corners: &CornerPoints, collaborators: &Collaborators) -> Result<ExtractionResult> {
        if !corners.is_simple_quad() {
            return Err(CaptureError::InvalidCorners(
                "Corners form a self-intersecting quadrilateral".to_string(),
            ));
        }

        let width = corners.target_width().round() as u32;
        let height = corners.target_height().round() as u32;
        if width < 2 || height < 2 {
            return Err(CaptureError::InvalidCorners(format!(
                "Corners span a degenerate {}x{} region",
                width, height
            )));
        }

        let backend = collaborators.images.require()?;
        let warped = backend.warp_perspective(image, corners, width, height)?;
        let encoded = encode_png(&warped)?;

        info!("Extracted {}x{} document image", width, height);
        Ok(ExtractionResult {
            success: true,
            image: Some(warped),
            encoded: Some(encoded),
            width,
            height,
            message: "Document extracted".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use image::{ImageBuffer, Luma};

    use crate::config::DetectionConfig;
    use crate::processing::contours::ImageprocContourDetector;
    use crate::processing::image::ImageprocBackend;
    use crate::processing::ocr::TesseractEngine;
    use crate::utils::geometry::Point;

    fn ready() -> Collaborators {
        Collaborators::with(
            Arc::new(ImageprocContourDetector::new(DetectionConfig::default())),
            Arc::new(ImageprocBackend::new()),
            Arc::new(TesseractEngine::new(None)),
        )
    }

    fn source() -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(200, 150, |x, y| Luma([((x + y) % 256) as u8])))
    }

    #[test]
    fn test_extracts_to_longest_edges() {
        let corners = CornerPoints {
            top_left: Point::new(10.0, 10.0),
            top_right: Point::new(170.0, 10.0),
            bottom_left: Point::new(10.0, 110.0),
            bottom_right: Point::new(190.0, 110.0),
        };
        let result = PerspectiveExtractor::new().extract(&source(), &corners, &ready());
        assert!(result.success, "{}", result.message);
        assert_eq!(result.width, 180);
        assert_eq!(result.height, 102);
        assert!(result.encoded.as_ref().map(|b| b.starts_with(&[0x89, b'P', b'N', b'G'])).unwrap_or(false));
        assert!(result.encoded_base64().unwrap().starts_with("iVBOR"));
    }

    #[test]
    fn test_self_intersecting_corners_fail_closed() {
        let corners = CornerPoints {
            top_left: Point::new(10.0, 10.0),
            top_right: Point::new(170.0, 110.0),
            bottom_left: Point::new(10.0, 110.0),
            bottom_right: Point::new(170.0, 10.0),
        };
        let result = PerspectiveExtractor::new().extract(&source(), &corners, &ready());
        assert!(!result.success);
        assert!(result.image.is_none());
        assert!(result.message.contains("self-intersecting"));
    }

    #[test]
    fn test_unloaded_backend_fails_closed() {
        let corners = CornerPoints::full_frame(200, 150);
        let result = PerspectiveExtractor::new().extract(&source(), &corners, &Collaborators::unloaded());
        assert!(!result.success);
        assert!(result.message.contains("not loaded"));
    }
}
