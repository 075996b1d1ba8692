//! Per-document OCR state: engine pool, block cache and rotation cache.

use super::pool::{OcrPool, PageImage};
use super::{page_to_blocks, OcrEngineFactory};
use crate::config::EngineConfig;
use crate::error::RedactorResult;
use crate::model::TextBlock;
use crate::render::PageRenderer;
use crate::transform::{scale_for_dpi, Rotation};
use std::collections::HashMap;

/// Drives the OCR pool for one open document and caches its output.
///
/// Both caches are only written after a whole OCR pass succeeded and are
/// cleared together by [`OcrOrchestrator::reset`].
pub struct OcrOrchestrator {
    factory: Box<dyn OcrEngineFactory>,
    pool: OcrPool,
    blocks: HashMap<usize, Vec<TextBlock>>,
    rotations: HashMap<usize, Rotation>,
    ocr_dpi: f32,
    orientation_dpi: f32,
    orientation_min_confidence: f32,
}

impl OcrOrchestrator {
    pub fn new(factory: Box<dyn OcrEngineFactory>, config: &EngineConfig) -> Self {
        Self {
            factory,
            pool: OcrPool::new(config.pool_size()),
            blocks: HashMap::new(),
            rotations: HashMap::new(),
            ocr_dpi: config.effective_ocr_dpi(),
            orientation_dpi: config.orientation_dpi,
            orientation_min_confidence: config.orientation_min_confidence,
        }
    }

    /// Forgets everything learned about the current document.
    ///
    /// The engine pool survives; it holds no per-document state.
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.rotations.clear();
    }

    pub fn pool(&self) -> &OcrPool {
        &self.pool
    }

    pub fn cached_blocks(&self, page: usize) -> Option<&[TextBlock]> {
        self.blocks.get(&page).map(Vec::as_slice)
    }

    pub fn is_cached(&self, page: usize) -> bool {
        self.blocks.contains_key(&page)
    }

    /// Orientation correction for a page, upright when never detected.
    pub fn rotation(&self, page: usize) -> Rotation {
        self.rotations.get(&page).copied().unwrap_or_default()
    }

    /// Makes sure every page in `pages` has OCR blocks in the cache.
    ///
    /// Pages already cached are skipped. `progress` receives
    /// `(completed, total)` for the pages that actually needed OCR.
    pub fn ensure_pages(
        &mut self,
        renderer: &dyn PageRenderer,
        pages: &[usize],
        progress: &mut dyn FnMut(usize, usize),
    ) -> RedactorResult<()> {
        let mut missing: Vec<usize> = pages
            .iter()
            .copied()
            .filter(|&p| !self.is_cached(p))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        if missing.is_empty() {
            return Ok(());
        }

        self.pool.initialize(self.factory.as_ref())?;
        log::info!(
            "running OCR on {} page(s) with {} engine(s)",
            missing.len(),
            self.pool.size()
        );

        let rotations = self.detect_rotations(renderer, &missing);
        let scale = scale_for_dpi(self.ocr_dpi);
        let total = missing.len();

        let jobs = missing.iter().map(|&page| {
            let rotation = rotations.get(&page).copied().unwrap_or_default();
            renderer
                .render_page(page, scale, rotation)
                .map(|image| PageImage { page, image })
        });
        let recognized = self.pool.recognize_all(jobs, total, progress)?;

        for (page, ocr) in recognized {
            let blocks = page_to_blocks(&ocr, scale);
            log::debug!("page {}: {} OCR block(s)", page, blocks.len());
            self.blocks.insert(page, blocks);
        }
        self.rotations.extend(rotations);
        Ok(())
    }

    /// Rotation for each page, reusing cached values.
    ///
    /// Detection problems never fail the scan: the page is treated as
    /// upright and a warning is logged.
    fn detect_rotations(
        &mut self,
        renderer: &dyn PageRenderer,
        pages: &[usize],
    ) -> HashMap<usize, Rotation> {
        let scale = scale_for_dpi(self.orientation_dpi);
        let mut detected = HashMap::new();
        let mut detector_available = true;

        for &page in pages {
            if let Some(rotation) = self.rotations.get(&page) {
                detected.insert(page, *rotation);
                continue;
            }
            if !detector_available {
                detected.insert(page, Rotation::None);
                continue;
            }

            let estimate = renderer
                .render_page(page, scale, Rotation::None)
                .and_then(|image| self.pool.detect_orientation(&image));
            let rotation = match estimate {
                Ok(Some(estimate)) if estimate.confidence >= self.orientation_min_confidence => {
                    Rotation::nearest(estimate.rotation_degrees)
                }
                Ok(Some(estimate)) => {
                    log::debug!(
                        "page {}: orientation confidence {:.2} too low, keeping upright",
                        page,
                        estimate.confidence
                    );
                    Rotation::None
                }
                Ok(None) => {
                    log::warn!("orientation detection unavailable, assuming upright pages");
                    detector_available = false;
                    Rotation::None
                }
                Err(err) => {
                    log::warn!("page {}: orientation detection failed: {}", page, err);
                    Rotation::None
                }
            };
            if rotation != Rotation::None {
                log::info!("page {}: correcting orientation by {} degrees", page, rotation.degrees());
            }
            detected.insert(page, rotation);
        }
        detected
    }
}
