use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;

use log::debug;

use crate::config::DetectionConfig;
use crate::models::CornerPoints;
use crate::utils::geometry::{self, Point};
use crate::utils::Result;

/// Boundary of a candidate document region, in image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    /// Area of the quadrilateral spanned by the contour's extreme points.
    pub fn quad_area(&self) -> f32 {
        match extreme_corners(&self.points) {
            Some(quad) => geometry::polygon_area(&quad),
            None => 0.0,
        }
    }
}

/// Finds the most likely document boundary in a grayscale frame.
pub trait ContourDetector: Send + Sync {
    fn name(&self) -> &str;

    /// The largest plausible document contour, or `None` when nothing was found.
    fn find_document_contour(&self, image: &GrayImage) -> Result<Option<Contour>>;

    /// Four corners of the contour in traversal order (TL, TR, BR, BL).
    fn corners_of(&self, contour: &Contour) -> Option<[Point; 4]>;
}

/// Edge-based contour detector: blur, Canny, dilate, border following.
pub struct ImageprocContourDetector {
    config: DetectionConfig,
}

impl ImageprocContourDetector {
    pub fn new(config: DetectionConfig) -> Self {
        ImageprocContourDetector { config }
    }
}

impl ContourDetector for ImageprocContourDetector {
    fn name(&self) -> &str {
        "imageproc-canny"
    }

    fn find_document_contour(&self, image: &GrayImage) -> Result<Option<Contour>> {
        if image.width() < 3 || image.height() < 3 {
            return Ok(None);
        }

        let blurred = gaussian_blur_f32(image, 1.0);
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        let edges = dilate(&edges, Norm::LInf, 1);

        let contours = find_contours::<i32>(&edges);
        debug!("Found {} raw contours", contours.len());

        let best = contours
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 4)
            .map(|c| Contour {
                points: c
                    .points
                    .iter()
                    .map(|p| Point::new(p.x as f32, p.y as f32))
                    .collect(),
            })
            .map(|c| (c.quad_area(), c))
            .filter(|(area, _)| *area > 0.0)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best.map(|(_, contour)| contour))
    }

    fn corners_of(&self, contour: &Contour) -> Option<[Point; 4]> {
        extreme_corners(&contour.points)
    }
}

fn extreme_corners(points: &[Point]) -> Option<[Point; 4]> {
    if points.len() < 4 {
        return None;
    }
    let first = [points[0], points[1], points[2], points[3]];
    let mut corners = CornerPoints::from_unordered(first);

    for p in &points[4..] {
        if p.x + p.y < corners.top_left.x + corners.top_left.y {
            corners.top_left = *p;
        }
        if p.x + p.y > corners.bottom_right.x + corners.bottom_right.y {
            corners.bottom_right = *p;
        }
        if p.x - p.y > corners.top_right.x - corners.top_right.y {
            corners.top_right = *p;
        }
        if p.x - p.y < corners.bottom_left.x - corners.bottom_left.y {
            corners.bottom_left = *p;
        }
    }

    let quad = corners.as_quad();
    if geometry::polygon_area(&quad) <= f32::EPSILON {
        return None;
    }
    Some(quad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn card_on_background() -> GrayImage {
        ImageBuffer::from_fn(200, 150, |x, y| {
            if (40..160).contains(&x) && (30..110).contains(&y) {
                Luma([230])
            } else {
                Luma([20])
            }
        })
    }

    #[test]
    fn test_detects_bright_card() {
        let detector = ImageprocContourDetector::new(DetectionConfig::default());
        let contour = detector
            .find_document_contour(&card_on_background())
            .unwrap()
            .expect("card contour");
        let [tl, tr, br, bl] = detector.corners_of(&contour).unwrap();

        let near = |p: Point, x: f32, y: f32| (p.x - x).abs() <= 5.0 && (p.y - y).abs() <= 5.0;
        assert!(near(tl, 40.0, 30.0), "top-left {:?}", tl);
        assert!(near(tr, 159.0, 30.0), "top-right {:?}", tr);
        assert!(near(br, 159.0, 109.0), "bottom-right {:?}", br);
        assert!(near(bl, 40.0, 109.0), "bottom-left {:?}", bl);
    }

    #[test]
    fn test_blank_frame_has_no_contour() {
        let detector = ImageprocContourDetector::new(DetectionConfig::default());
        let blank: GrayImage = ImageBuffer::from_pixel(100, 80, Luma([128]));
        assert!(detector.find_document_contour(&blank).unwrap().is_none());
    }

    #[test]
    fn test_corners_need_four_points() {
        let detector = ImageprocContourDetector::new(DetectionConfig::default());
        let contour = Contour {
            points: vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)],
        };
        assert!(detector.corners_of(&contour).is_none());
    }
}
