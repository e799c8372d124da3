pub mod error;
pub mod geometry;
pub mod text;

pub use error::{CaptureError, Result};
