pub mod config;
pub mod models;
pub mod processing;
pub mod scanner;
pub mod session;
pub mod utils;
pub mod validation;

pub use config::CaptureConfig;
pub use scanner::DocumentScanner;
pub use session::{DocumentPage, PageSide, ScannerSession, ScannerStage};
pub use utils::{CaptureError, Result};
