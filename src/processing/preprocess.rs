// OCR preprocessing for the rectified document image. Both pipelines degrade
// to the unmodified input when the image backend is unavailable or fails.

use image::{DynamicImage, GrayImage};
use log::{debug, warn};

use crate::config::PreprocessConfig;
use crate::processing::collaborator::Collaborators;
use crate::processing::image::{ImageBackend, MorphOp, Resample};
use crate::utils::Result;

pub struct OcrPreprocessor {
    config: PreprocessConfig,
}

impl OcrPreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        OcrPreprocessor { config }
    }

    /// Upscale, binarise with a local threshold and remove speckle noise.
    pub fn general(&self, image: &DynamicImage, collaborators: &Collaborators) -> DynamicImage {
        let backend = match collaborators.images.get() {
            Some(backend) => backend,
            None => {
                debug!("Image backend not loaded, skipping general preprocessing");
                return image.clone();
            }
        };

        match self.general_pipeline(image, backend.as_ref()) {
            Ok(processed) => DynamicImage::ImageLuma8(processed),
            Err(e) => {
                warn!("General preprocessing failed, using original image: {}", e);
                image.clone()
            }
        }
    }

    /// Crop the bottom band holding the MRZ and binarise it for OCR-B text.
    pub fn mrz_zone(&self, image: &DynamicImage, collaborators: &Collaborators) -> DynamicImage {
        let backend = match collaborators.images.get() {
            Some(backend) => backend,
            None => {
                debug!("Image backend not loaded, skipping MRZ preprocessing");
                return image.clone();
            }
        };

        match self.mrz_pipeline(image, backend.as_ref()) {
            Ok(processed) => DynamicImage::ImageLuma8(processed),
            Err(e) => {
                warn!("MRZ preprocessing failed, using original image: {}", e);
                image.clone()
            }
        }
    }

    /// Scale factor bringing the image to the minimum OCR size, capped.
    fn general_scale(&self, width: u32, height: u32) -> f32 {
        let needed = (self.config.min_width as f32 / width.max(1) as f32)
            .max(self.config.min_height as f32 / height.max(1) as f32);
        needed.clamp(1.0, self.config.max_upscale)
    }

    fn general_pipeline(&self, image: &DynamicImage, backend: &dyn ImageBackend) -> Result<GrayImage> {
        let scale = self.general_scale(image.width(), image.height());
        let scaled;
        let source = if scale > 1.0 {
            scaled = backend.resize(
                image,
                (image.width() as f32 * scale).round() as u32,
                (image.height() as f32 * scale).round() as u32,
                Resample::Smooth,
            )?;
            &scaled
        } else {
            image
        };

        let gray = backend.grayscale(source)?;
        let binary = backend.adaptive_threshold(
            &gray,
            self.config.adaptive_block_size,
            self.config.adaptive_constant,
        )?;
        backend.morphology(&binary, MorphOp::Open, self.config.morph_kernel)
    }

    fn mrz_pipeline(&self, image: &DynamicImage, backend: &dyn ImageBackend) -> Result<GrayImage> {
        let band_height = ((image.height() as f32 * self.config.mrz_band_ratio).round() as u32)
            .clamp(1, image.height().max(1));
        let band = backend.crop(image, 0, image.height() - band_height, image.width(), band_height)?;

        let scale = (self.config.mrz_min_height as f32 / band_height as f32).max(self.config.mrz_min_upscale);
        let band = backend.resize(
            &band,
            (band.width() as f32 * scale).round() as u32,
            (band.height() as f32 * scale).round() as u32,
            Resample::Smooth,
        )?;

        let gray = backend.grayscale(&band)?;
        let binary = backend.otsu_threshold(&gray)?;

        // MRZ text must end up dark on light.
        let binary = if backend.mean_value(&binary)? < 127.0 {
            backend.invert(&binary)?
        } else {
            binary
        };

        backend.morphology(&binary, MorphOp::Close, self.config.morph_kernel)
    }
}
