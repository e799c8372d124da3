//! Lifecycle of the swappable collaborators (contour detector, image backend,
//! OCR engine).
//!
//! A [`CollaboratorSlot`] is loaded at most once: concurrent `load` calls
//! share the single in-flight initialisation. Readiness is observable via
//! [`CollaboratorSlot::state`] and is passed explicitly to every pipeline call
//! through [`Collaborators`].

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::info;
use tokio::sync::OnceCell;

use crate::config::CaptureConfig;
use crate::processing::contours::{ContourDetector, ImageprocContourDetector};
use crate::processing::image::{ImageBackend, ImageprocBackend};
use crate::processing::ocr::{OcrEngine, TesseractEngine};
use crate::utils::{CaptureError, Result};

pub enum Collaborator<T: ?Sized> {
    NotLoaded,
    Loading,
    Ready(Arc<T>),
}

impl<T: ?Sized> std::fmt::Debug for Collaborator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Collaborator::NotLoaded => write!(f, "NotLoaded"),
            Collaborator::Loading => write!(f, "Loading"),
            Collaborator::Ready(_) => write!(f, "Ready"),
        }
    }
}

pub struct CollaboratorSlot<T: ?Sized> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
    in_flight: AtomicUsize,
}

impl<T: ?Sized + Send + Sync> CollaboratorSlot<T> {
    pub fn new(name: &'static str) -> Self {
        CollaboratorSlot {
            name,
            cell: OnceCell::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// A slot that is ready from the start.
    pub fn ready(name: &'static str, handle: Arc<T>) -> Self {
        CollaboratorSlot {
            name,
            cell: OnceCell::new_with(Some(handle)),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> Collaborator<T> {
        match self.cell.get() {
            Some(handle) => Collaborator::Ready(handle.clone()),
            None if self.in_flight.load(Ordering::SeqCst) > 0 => Collaborator::Loading,
            None => Collaborator::NotLoaded,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    /// The ready handle or a `CollaboratorUnavailable` error.
    pub fn require(&self) -> Result<Arc<T>> {
        self.get().ok_or_else(|| {
            CaptureError::CollaboratorUnavailable(format!("{} is not loaded", self.name))
        })
    }

    /// Load the collaborator, or wait for a load already in progress. A
    /// failed load leaves the slot empty so it can be retried.
    pub async fn load<F, Fut>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>>>,
    {
        if let Some(handle) = self.cell.get() {
            return Ok(handle.clone());
        }

        let loaded = {
            let _loading = InFlight::enter(&self.in_flight);
            self.cell.get_or_try_init(init).await.map(Arc::clone)
        };

        if loaded.is_ok() {
            info!("Collaborator {} ready", self.name);
        }
        loaded
    }
}

/// Counts a pending load for as long as it lives, including when the load
/// future is dropped before completing.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handles to all collaborators, passed into each pipeline call.
pub struct Collaborators {
    pub contours: CollaboratorSlot<dyn ContourDetector>,
    pub images: CollaboratorSlot<dyn ImageBackend>,
    pub ocr: CollaboratorSlot<dyn OcrEngine>,
}

impl Collaborators {
    pub fn unloaded() -> Self {
        Collaborators {
            contours: CollaboratorSlot::new("contour detector"),
            images: CollaboratorSlot::new("image backend"),
            ocr: CollaboratorSlot::new("OCR engine"),
        }
    }

    pub fn with(
        contours: Arc<dyn ContourDetector>,
        images: Arc<dyn ImageBackend>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Collaborators {
            contours: CollaboratorSlot::ready("contour detector", contours),
            images: CollaboratorSlot::ready("image backend", images),
            ocr: CollaboratorSlot::ready("OCR engine", ocr),
        }
    }

    /// Load the native adapters: imageproc for geometry and thresholds,
    /// tesseract for OCR.
    pub async fn load_native(&self, config: &CaptureConfig) -> Result<()> {
        let detection = config.detection.clone();
        self.contours
            .load(|| async move {
                Ok(Arc::new(ImageprocContourDetector::new(detection)) as Arc<dyn ContourDetector>)
            })
            .await?;

        self.images
            .load(|| async { Ok(Arc::new(ImageprocBackend::new()) as Arc<dyn ImageBackend>) })
            .await?;

        let ocr = config.ocr.clone();
        self.ocr
            .load(|| async move {
                let engine = TesseractEngine::probe(ocr.tessdata_path.clone(), &ocr.general_language).await?;
                Ok(Arc::new(engine) as Arc<dyn OcrEngine>)
            })
            .await?;

        Ok(())
    }
}
