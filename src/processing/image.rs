use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgba, RgbaImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::models::CornerPoints;
use crate::utils::{CaptureError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resample {
    /// Cubic interpolation, used when upscaling text.
    Smooth,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    Open,
    Close,
}

/// Image-processing operations the pipeline needs. Every call returns a new
/// owned buffer; intermediates are released when they go out of scope.
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &str;
    fn grayscale(&self, image: &DynamicImage) -> Result<GrayImage>;
    fn resize(&self, image: &DynamicImage, width: u32, height: u32, mode: Resample) -> Result<DynamicImage>;
    fn crop(&self, image: &DynamicImage, x: u32, y: u32, width: u32, height: u32) -> Result<DynamicImage>;
    fn adaptive_threshold(&self, image: &GrayImage, block_size: u32, constant: i32) -> Result<GrayImage>;
    fn otsu_threshold(&self, image: &GrayImage) -> Result<GrayImage>;
    fn morphology(&self, image: &GrayImage, op: MorphOp, kernel: u32) -> Result<GrayImage>;
    fn invert(&self, image: &GrayImage) -> Result<GrayImage>;
    fn mean_value(&self, image: &GrayImage) -> Result<f32>;
    fn warp_perspective(&self, image: &DynamicImage, corners: &CornerPoints, width: u32, height: u32) -> Result<DynamicImage>;
}

/// Native backend built on `image` and `imageproc`.
#[derive(Debug, Default)]
pub struct ImageprocBackend;

impl ImageprocBackend {
    pub fn new() -> Self {
        ImageprocBackend
    }

    // Rectangular min/max filter; the anchor sits at kernel/2 like OpenCV.
    fn rank_filter(image: &GrayImage, kernel: u32, take_max: bool) -> GrayImage {
        let (width, height) = image.dimensions();
        let before = (kernel / 2) as i64;
        let after = kernel as i64 - 1 - before;
        let mut out = ImageBuffer::new(width, height);

        for y in 0..height as i64 {
            for x in 0..width as i64 {
                let mut value = if take_max { 0u8 } else { 255u8 };
                for ky in (y - before)..=(y + after) {
                    if ky < 0 || ky >= height as i64 {
                        continue;
                    }
                    for kx in (x - before)..=(x + after) {
                        if kx < 0 || kx >= width as i64 {
                            continue;
                        }
                        let p = image.get_pixel(kx as u32, ky as u32)[0];
                        value = if take_max { value.max(p) } else { value.min(p) };
                    }
                }
                out.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }

        out
    }
}

impl ImageBackend for ImageprocBackend {
    fn name(&self) -> &str {
        "imageproc"
    }

    fn grayscale(&self, image: &DynamicImage) -> Result<GrayImage> {
        Ok(image.to_luma8())
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32, mode: Resample) -> Result<DynamicImage> {
        if width == 0 || height == 0 {
            return Err(CaptureError::ImageProcessingError(format!(
                "Cannot resize to {}x{}",
                width, height
            )));
        }
        let filter = match mode {
            Resample::Smooth => FilterType::CatmullRom,
            Resample::Nearest => FilterType::Nearest,
        };
        Ok(image.resize_exact(width, height, filter))
    }

    fn crop(&self, image: &DynamicImage, x: u32, y: u32, width: u32, height: u32) -> Result<DynamicImage> {
        if width == 0 || height == 0 || x + width > image.width() || y + height > image.height() {
            return Err(CaptureError::ImageProcessingError(format!(
                "Crop {}x{}+{}+{} outside {}x{} image",
                width,
                height,
                x,
                y,
                image.width(),
                image.height()
            )));
        }
        Ok(image.crop_imm(x, y, width, height))
    }

    /// Gaussian-weighted local threshold: a pixel is white when it is brighter
    /// than its neighbourhood mean minus `constant`.
    fn adaptive_threshold(&self, image: &GrayImage, block_size: u32, constant: i32) -> Result<GrayImage> {
        if block_size < 3 || block_size % 2 == 0 {
            return Err(CaptureError::ImageProcessingError(format!(
                "Adaptive threshold block size must be odd and >= 3, got {}",
                block_size
            )));
        }
        let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
        let local_mean = gaussian_blur_f32(image, sigma);

        let mut out = ImageBuffer::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            let threshold = local_mean.get_pixel(x, y)[0] as i32 - constant;
            let value = if pixel[0] as i32 > threshold { 255 } else { 0 };
            out.put_pixel(x, y, Luma([value]));
        }
        Ok(out)
    }

    fn otsu_threshold(&self, image: &GrayImage) -> Result<GrayImage> {
        let level = otsu_level(image);
        let mut out = image.clone();
        for pixel in out.pixels_mut() {
            pixel[0] = if pixel[0] > level { 255 } else { 0 };
        }
        Ok(out)
    }

    fn morphology(&self, image: &GrayImage, op: MorphOp, kernel: u32) -> Result<GrayImage> {
        if kernel == 0 {
            return Err(CaptureError::ImageProcessingError("Kernel size must be positive".to_string()));
        }
        let result = match op {
            MorphOp::Open => {
                let eroded = Self::rank_filter(image, kernel, false);
                Self::rank_filter(&eroded, kernel, true)
            }
            MorphOp::Close => {
                let dilated = Self::rank_filter(image, kernel, true);
                Self::rank_filter(&dilated, kernel, false)
            }
        };
        Ok(result)
    }

    fn invert(&self, image: &GrayImage) -> Result<GrayImage> {
        let mut out = image.clone();
        image::imageops::invert(&mut out);
        Ok(out)
    }

    fn mean_value(&self, image: &GrayImage) -> Result<f32> {
        let count = image.width() as u64 * image.height() as u64;
        if count == 0 {
            return Err(CaptureError::ImageProcessingError("Empty image".to_string()));
        }
        let sum: u64 = image.pixels().map(|p| p[0] as u64).sum();
        Ok(sum as f32 / count as f32)
    }

    fn warp_perspective(&self, image: &DynamicImage, corners: &CornerPoints, width: u32, height: u32) -> Result<DynamicImage> {
        if width == 0 || height == 0 {
            return Err(CaptureError::ImageProcessingError(format!(
                "Invalid warp target {}x{}",
                width, height
            )));
        }

        let from = corners.as_quad().map(|p| (p.x, p.y));
        let (w, h) = (width as f32, height as f32);
        let to = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

        let projection = Projection::from_control_points(from, to).ok_or_else(|| {
            CaptureError::ImageProcessingError("Corners do not define a valid projection".to_string())
        })?;

        let source = image.to_rgba8();
        let mut out: RgbaImage = ImageBuffer::new(width, height);
        warp_into(&source, &projection, Interpolation::Bilinear, Rgba([255, 255, 255, 255]), &mut out);
        Ok(DynamicImage::ImageRgba8(out))
    }
}

/// PNG-encode an image.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| CaptureError::ImageProcessingError(format!("Failed to encode image: {}", e)))?;
    Ok(buffer)
}
