pub mod collaborator;
pub mod contours;
pub mod corners;
pub mod corrections;
pub mod extractors;
pub mod field_correction;
pub mod image;
pub mod mrz;
pub mod ocr;
pub mod perspective;
pub mod preprocess;

pub use collaborator::{Collaborator, CollaboratorSlot, Collaborators};
pub use contours::{Contour, ContourDetector, ImageprocContourDetector};
pub use corners::CornerDetector;
pub use corrections::{CorrectionTables, FieldContext};
pub use extractors::LabelExtractor;
pub use field_correction::FieldCorrection;
pub use self::image::{ImageBackend, ImageprocBackend, MorphOp, Resample};
pub use mrz::MrzDecoder;
pub use ocr::{OcrEngine, OcrOptions, OcrText, TesseractEngine};
pub use perspective::{ExtractionResult, PerspectiveExtractor};
pub use preprocess::OcrPreprocessor;
