use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
    #[error("Image processing error: {0}")]
    ImageProcessingError(String),
    #[error("OCR error: {0}")]
    OcrError(String),
    #[error("Document detection error: {0}")]
    DetectionError(String),
    #[error("Invalid corners: {0}")]
    InvalidCorners(String),
    #[error("MRZ parsing error: {0}")]
    MrzParsingError(String),
    #[error("Invalid scanner transition: {0}")]
    InvalidTransition(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::ImageProcessingError(err.to_string())
    }
}
