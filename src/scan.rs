//! The scan session: one open document, its caches and its matches.

use crate::config::{EngineConfig, ScanMode};
use crate::correlate::{estimate, QuadCorrelator};
use crate::domain::compile_terms;
use crate::error::{RedactorError, RedactorResult};
use crate::geometry::{PageSize, Point, Rect};
use crate::model::{BlockGeometry, Match, TextBlock, TextSource, Word};
use crate::ocr::{OcrEngineFactory, OcrOrchestrator, TesseractConfig, TesseractFactory};
use crate::redaction::{RedactionOutput, Redactor};
use crate::render::{MuPdfRenderer, PageRenderer};
use crate::store::{normalize_drag, MatchStore, Overlay};
use crate::transform::{display_to_pdf, rotate_rect, PageGeometry, Rotation};
use crate::writer::{DocumentWriter, LopdfWriter};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Progress notifications emitted during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanProgress {
    /// Native text of `page` was read.
    ExtractingText { page: usize, total: usize },
    /// `completed` of `total` pages went through OCR.
    Recognizing { completed: usize, total: usize },
    /// Terms were matched against `page`.
    Matching { page: usize, total: usize },
}

/// Owns everything derived from the currently open document.
///
/// Loading a document or calling [`Session::reset`] drops the OCR block
/// cache, the rotation cache and every match in one step.
pub struct Session {
    config: EngineConfig,
    renderer: Option<Box<dyn PageRenderer>>,
    ocr: OcrOrchestrator,
    store: MatchStore,
    redactor: Redactor,
}

impl Session {
    pub fn new(config: EngineConfig, factory: Box<dyn OcrEngineFactory>) -> RedactorResult<Self> {
        config.validate()?;
        Ok(Self {
            ocr: OcrOrchestrator::new(factory, &config),
            redactor: Redactor::from_config(&config),
            store: MatchStore::new(),
            renderer: None,
            config,
        })
    }

    /// A session recognizing with the Tesseract command line tool.
    pub fn with_tesseract(config: EngineConfig, tesseract: TesseractConfig) -> RedactorResult<Self> {
        Self::new(config, Box::new(TesseractFactory::new(tesseract)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Opens a new document, discarding all state of the previous one.
    pub fn load(&mut self, renderer: Box<dyn PageRenderer>) {
        self.reset();
        log::info!("loaded document with {} page(s)", renderer.page_count());
        self.renderer = Some(renderer);
    }

    /// Opens PDF bytes with the MuPDF renderer.
    pub fn load_pdf(&mut self, bytes: &[u8]) -> RedactorResult<()> {
        let renderer = MuPdfRenderer::from_bytes(bytes)?;
        self.load(Box::new(renderer));
        Ok(())
    }

    /// Clears caches and matches; the document stays open.
    pub fn reset(&mut self) {
        self.ocr.reset();
        self.store.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.renderer.as_ref().map_or(0, |r| r.page_count())
    }

    fn renderer(&self) -> RedactorResult<&dyn PageRenderer> {
        self.renderer
            .as_deref()
            .ok_or_else(|| RedactorError::invalid_input("document", "no document loaded"))
    }

    /// Orientation correction in effect for `page`.
    pub fn rotation(&self, page: usize) -> Rotation {
        self.ocr.rotation(page)
    }

    /// Whether OCR output for `page` is held from an earlier scan.
    pub fn has_ocr_text(&self, page: usize) -> bool {
        self.ocr.is_cached(page)
    }

    /// Corrected geometry of `page` for a render at `render_scale`.
    pub fn page_geometry(&self, page: usize, render_scale: f32) -> RedactorResult<PageGeometry> {
        let intrinsic = self.renderer()?.page_size(page)?;
        Ok(PageGeometry::new(intrinsic, render_scale, self.rotation(page)))
    }

    /// Renders a corrected preview of `page` together with its geometry.
    pub fn render_preview(&self, page: usize, render_scale: f32) -> RedactorResult<(RgbImage, PageGeometry)> {
        let geometry = self.page_geometry(page, render_scale)?;
        let image = self
            .renderer()?
            .render_page(page, render_scale, geometry.rotation)?;
        Ok((image, geometry))
    }

    pub fn matches(&self) -> &[Match] {
        self.store.matches()
    }

    pub fn scan<S: AsRef<str>>(&mut self, terms: &[S]) -> RedactorResult<&[Match]> {
        self.scan_with_progress(terms, &mut |_| {})
    }

    /// Finds every term on every page and replaces the automatic matches.
    ///
    /// Manual matches are kept. On error the previous matches and caches
    /// are left untouched.
    pub fn scan_with_progress<S: AsRef<str>>(
        &mut self,
        terms: &[S],
        progress: &mut dyn FnMut(ScanProgress),
    ) -> RedactorResult<&[Match]> {
        let renderer = self
            .renderer
            .as_deref()
            .ok_or_else(|| RedactorError::invalid_input("document", "no document loaded"))?;
        let terms = compile_terms(terms);
        if terms.is_empty() {
            log::info!("no usable terms, clearing automatic matches");
            return Ok(self.store.replace_automatic(Vec::new()));
        }

        let total = renderer.page_count();
        let mut native = Vec::with_capacity(total);
        for page in 0..total {
            native.push(renderer.extract_structured_text(page)?);
            progress(ScanProgress::ExtractingText { page, total });
        }

        let ocr_pages: BTreeSet<usize> = (0..total)
            .filter(|&page| match self.config.scan_mode {
                ScanMode::Native => false,
                ScanMode::Ocr => true,
                ScanMode::Auto => native[page].iter().all(|b| b.text.trim().is_empty()),
            })
            .collect();
        if !ocr_pages.is_empty() {
            let pages: Vec<usize> = ocr_pages.iter().copied().collect();
            self.ocr.ensure_pages(renderer, &pages, &mut |completed, total| {
                progress(ScanProgress::Recognizing { completed, total })
            })?;
        }

        let padding = self.config.bbox_padding;
        let mut correlator = QuadCorrelator::new();
        let mut found = Vec::new();

        for (page, native_blocks) in native.into_iter().enumerate() {
            let rotation = self.ocr.rotation(page);
            let intrinsic = renderer.page_size(page)?;
            let mut blocks: Vec<TextBlock> = native_blocks
                .into_iter()
                .map(|block| to_corrected(block, rotation, intrinsic))
                .collect();
            if ocr_pages.contains(&page) {
                if let Some(cached) = self.ocr.cached_blocks(page) {
                    blocks.extend_from_slice(cached);
                }
            }

            for term in &terms {
                for block in &blocks {
                    for candidate in term.candidates(&block.text) {
                        let guess = estimate(block, &candidate);
                        let bbox = match block.source {
                            TextSource::Ocr => guess,
                            TextSource::Native => {
                                correlator.resolve(page, &candidate.text, block, guess, || {
                                    search_corrected(renderer, page, &candidate.text, rotation, intrinsic)
                                })
                            }
                        };
                        found.push(Match {
                            text: candidate.text,
                            term: term.term().to_string(),
                            bbox: if padding > 0.0 { bbox.pad(padding) } else { bbox },
                            page,
                            is_manual: false,
                        });
                    }
                }
            }
            progress(ScanProgress::Matching { page, total });
        }

        log::info!("scan found {} match(es) on {} page(s)", found.len(), total);
        Ok(self.store.replace_automatic(found))
    }

    /// Adds a manual match given in corrected page user space.
    pub fn add_manual_match(&mut self, page: usize, bbox: Rect) -> RedactorResult<&[Match]> {
        let page_count = self.page_count();
        self.store.add_manual(page, bbox, page_count)
    }

    /// Turns a drag rectangle drawn on a preview into a manual match.
    ///
    /// Returns `Ok(None)` when the rectangle is below the minimum size.
    pub fn commit_drag(
        &mut self,
        page: usize,
        display_rect: Rect,
        render_scale: f32,
        display_scale: f32,
    ) -> RedactorResult<Option<&[Match]>> {
        let Some(rect) = normalize_drag(
            Point::new(display_rect.x0, display_rect.y0),
            Point::new(display_rect.x1, display_rect.y1),
            self.config.min_manual_size,
        ) else {
            log::debug!("ignoring drag below {} px", self.config.min_manual_size);
            return Ok(None);
        };
        let bbox = display_to_pdf(rect, render_scale, display_scale);
        self.add_manual_match(page, bbox).map(Some)
    }

    pub fn remove_match(&mut self, index: usize) -> Option<Match> {
        self.store.remove(index)
    }

    /// Replaces all matches with a previously saved list.
    pub fn restore_matches(&mut self, matches: Vec<Match>) -> RedactorResult<&[Match]> {
        let page_count = self.page_count();
        if let Some(bad) = matches.iter().find(|m| m.page >= page_count) {
            return Err(RedactorError::invalid_input(
                "matches",
                format!("match on page {} but document has {} page(s)", bad.page, page_count),
            ));
        }
        let (manual, automatic): (Vec<Match>, Vec<Match>) =
            matches.into_iter().partition(|m| m.is_manual);
        self.store.clear();
        for m in manual {
            self.store.add_manual(m.page, m.bbox, page_count)?;
        }
        Ok(self.store.replace_automatic(automatic))
    }

    pub fn overlays(&self, page: usize, render_scale: f32, display_scale: f32) -> Vec<Overlay> {
        self.store.overlays(page, render_scale, display_scale)
    }

    /// Writes the redacted document through `writer`.
    pub fn redact(&self, writer: &mut dyn DocumentWriter) -> RedactorResult<RedactionOutput> {
        let renderer = self.renderer()?;
        self.redactor
            .redact(renderer, writer, self.store.matches(), |page| self.ocr.rotation(page))
    }
}

/// Maps a native block from intrinsic into corrected page space.
fn to_corrected(block: TextBlock, rotation: Rotation, intrinsic: PageSize) -> TextBlock {
    if rotation == Rotation::None {
        return block;
    }
    let TextBlock {
        text,
        bbox,
        source,
        geometry,
    } = block;
    let geometry = match geometry {
        BlockGeometry::Uniform => BlockGeometry::Uniform,
        BlockGeometry::WordLevel(words) => BlockGeometry::WordLevel(
            words
                .into_iter()
                .map(|w| Word {
                    bbox: rotate_rect(w.bbox, rotation, intrinsic),
                    text: w.text,
                })
                .collect(),
        ),
    };
    TextBlock {
        text,
        bbox: rotate_rect(bbox, rotation, intrinsic),
        source,
        geometry,
    }
}

/// Glyph rectangles of `text` on `page` in corrected space.
///
/// Search failures degrade to no authoritative geometry.
fn search_corrected(
    renderer: &dyn PageRenderer,
    page: usize,
    text: &str,
    rotation: Rotation,
    intrinsic: PageSize,
) -> Vec<Rect> {
    match renderer.search_literal(page, text) {
        Ok(quads) => quads
            .iter()
            .map(|q| rotate_rect(q.bounds(), rotation, intrinsic))
            .collect(),
        Err(err) => {
            log::warn!("page {}: literal search failed: {}", page, err);
            Vec::new()
        }
    }
}

/// Serializable result of [`scan_pdf`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Corrected geometry of every page, at a render scale of 1.
    pub pages: Vec<PageGeometry>,
    pub matches: Vec<Match>,
}

impl ScanReport {
    /// Orientation corrections to reuse when redacting.
    pub fn rotations(&self) -> BTreeMap<usize, Rotation> {
        self.pages
            .iter()
            .enumerate()
            .filter(|(_, g)| g.rotation != Rotation::None)
            .map(|(page, g)| (page, g.rotation))
            .collect()
    }
}

/// Scans PDF bytes with the bundled MuPDF and Tesseract backends.
pub fn scan_pdf<S: AsRef<str>>(
    bytes: &[u8],
    terms: &[S],
    config: &EngineConfig,
    tesseract: &TesseractConfig,
) -> RedactorResult<ScanReport> {
    let mut session = Session::with_tesseract(config.clone(), tesseract.clone())?;
    session.load_pdf(bytes)?;
    let matches = session.scan(terms)?.to_vec();
    let pages = (0..session.page_count())
        .map(|page| session.page_geometry(page, 1.0))
        .collect::<RedactorResult<Vec<_>>>()?;
    Ok(ScanReport { pages, matches })
}

/// Redacts PDF bytes with the bundled MuPDF renderer and lopdf writer.
///
/// `rotations` holds the corrections recorded by the scan that produced
/// `matches`; pages not listed are upright.
pub fn redact_pdf(
    bytes: &[u8],
    matches: &[Match],
    rotations: &BTreeMap<usize, Rotation>,
    config: &EngineConfig,
) -> RedactorResult<RedactionOutput> {
    config.validate()?;
    let renderer = MuPdfRenderer::from_bytes(bytes)?;
    let mut writer = LopdfWriter::with_source(bytes)?;
    Redactor::from_config(config).redact(&renderer, &mut writer, matches, |page| {
        rotations.get(&page).copied().unwrap_or_default()
    })
}
