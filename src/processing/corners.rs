use image::DynamicImage;
use log::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::models::{CornerPoints, DetectionResult};
use crate::processing::collaborator::Collaborators;

/// Locates the document quadrilateral in a frame and scores how much the
/// detection can be trusted.
pub struct CornerDetector {
    config: DetectionConfig,
}

impl CornerDetector {
    pub fn new(config: DetectionConfig) -> Self {
        CornerDetector { config }
    }

    pub fn detect(&self, image: &DynamicImage, collaborators: &Collaborators) -> DetectionResult {
        let detector = match collaborators.contours.require() {
            Ok(detector) => detector,
            Err(e) => return DetectionResult::not_found(e.to_string()),
        };
        let images = match collaborators.images.require() {
            Ok(images) => images,
            Err(e) => return DetectionResult::not_found(e.to_string()),
        };

        let gray = match images.grayscale(image) {
            Ok(gray) => gray,
            Err(e) => {
                warn!("Grayscale conversion failed during detection: {}", e);
                return DetectionResult::not_found(format!("Detection failed: {}", e));
            }
        };

        let contour = match detector.find_document_contour(&gray) {
            Ok(Some(contour)) => contour,
            Ok(None) => return DetectionResult::not_found("No document found in image"),
            Err(e) => {
                warn!("{} failed: {}", detector.name(), e);
                return DetectionResult::not_found(format!("Detection failed: {}", e));
            }
        };

        let quad = match detector.corners_of(&contour) {
            Some(quad) => quad,
            None => return DetectionResult::not_found("Could not extract four corners from contour"),
        };

        let corners = CornerPoints::from_unordered(quad);
        if !corners.is_simple_quad() {
            return DetectionResult::not_found("Detected corners form a self-intersecting quadrilateral");
        }

        let frame_area = image.width() as f32 * image.height() as f32;
        let confidence = self.confidence(&corners, frame_area);
        info!("Document corners detected with confidence {:.2}", confidence);

        DetectionResult {
            success: true,
            corners: Some(corners),
            confidence,
            message: if confidence < self.config.manual_adjust_threshold {
                "Low confidence detection, adjust corners manually".to_string()
            } else {
                "Document detected".to_string()
            },
        }
    }

    /// Penalise implausible area coverage and aspect ratios.
    pub fn confidence(&self, corners: &CornerPoints, frame_area: f32) -> f32 {
        let mut confidence: f32 = 1.0;

        if frame_area > 0.0 {
            let area_ratio = corners.area() / frame_area;
            if area_ratio < self.config.min_area_ratio {
                confidence *= 0.5;
            }
            if area_ratio > self.config.max_area_ratio {
                confidence *= 0.7;
            }
            debug!("Corner area ratio {:.3}", area_ratio);
        }

        let aspect = corners.average_aspect_ratio();
        if aspect < self.config.min_aspect_ratio || aspect > self.config.max_aspect_ratio {
            confidence *= 0.6;
        }

        confidence.clamp(0.0, 1.0)
    }

    pub fn needs_manual_adjustment(&self, result: &DetectionResult) -> bool {
        !result.success || result.confidence < self.config.manual_adjust_threshold
    }
}
