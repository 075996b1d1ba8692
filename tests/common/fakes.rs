//! In-memory stand-ins for the renderer, the OCR engine and the writer.
//!
//! Rendered rasters are a flat colour whose blue channel carries the page
//! index, so a fake engine can tell which page it was handed even after
//! the raster went through a rotation and a worker thread.

use image::{Rgb, RgbImage};
use redactkit::error::{RedactorError, RedactorResult};
use redactkit::ocr::{
    OcrEngine, OcrEngineFactory, OcrLine, OcrPage, OcrWord, OrientationEstimate,
};
use redactkit::render::PageRenderer;
use redactkit::transform::{rotate_image, Rotation};
use redactkit::writer::{DocumentWriter, PageHandle, PageSpec};
use redactkit::model::Word;
use redactkit::{PageSize, Point, Quad, Rect, TextBlock, TextSource};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Background of every fake raster; blue is replaced by the page index.
pub const PAPER: [u8; 2] = [250, 250];

pub const LETTER: PageSize = PageSize::new(612.0, 792.0);
pub const LETTER_LANDSCAPE: PageSize = PageSize::new(792.0, 612.0);

/// A native line built from `(text, x0, x1)` words sharing one baseline band.
pub fn native_line(words: &[(&str, f32, f32)], y0: f32, y1: f32) -> TextBlock {
    TextBlock::from_words(
        words
            .iter()
            .map(|(text, x0, x1)| Word {
                text: text.to_string(),
                bbox: Rect::new(*x0, y0, *x1, y1),
            })
            .collect(),
        TextSource::Native,
    )
    .expect("at least one word")
}

pub fn quad(rect: Rect) -> Quad {
    Quad {
        ul: Point::new(rect.x0, rect.y0),
        ur: Point::new(rect.x1, rect.y0),
        ll: Point::new(rect.x0, rect.y1),
        lr: Point::new(rect.x1, rect.y1),
    }
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub size: PageSize,
    pub blocks: Vec<TextBlock>,
    pub quads: HashMap<String, Vec<Rect>>,
}

impl FakePage {
    pub fn new(size: PageSize) -> Self {
        Self {
            size,
            blocks: Vec::new(),
            quads: HashMap::new(),
        }
    }

    /// A page without a text layer.
    pub fn scanned(size: PageSize) -> Self {
        Self::new(size)
    }

    pub fn with_block(mut self, block: TextBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Glyph rectangles returned when searching for `text`.
    pub fn with_quads(mut self, text: &str, rects: Vec<Rect>) -> Self {
        self.quads.insert(text.to_string(), rects);
        self
    }
}

/// Counters shared between a [`FakeRenderer`] and the test body.
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    pub renders: Arc<AtomicUsize>,
    pub searches: Arc<AtomicUsize>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeRenderer {
    pages: Vec<FakePage>,
    fail_render: HashSet<usize>,
    fail_size: HashSet<usize>,
    fail_search: bool,
    pub stats: RenderStats,
}

impl FakeRenderer {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn failing_render(mut self, page: usize) -> Self {
        self.fail_render.insert(page);
        self
    }

    /// Makes every access to `page` fail, its size included.
    pub fn unreadable(mut self, page: usize) -> Self {
        self.fail_size.insert(page);
        self.fail_render.insert(page);
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    fn page(&self, page: usize) -> RedactorResult<&FakePage> {
        self.pages.get(page).ok_or_else(|| RedactorError::Render {
            page,
            message: "no such page".into(),
        })
    }
}

impl PageRenderer for FakeRenderer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> RedactorResult<PageSize> {
        if self.fail_size.contains(&page) {
            return Err(RedactorError::Render {
                page,
                message: "simulated damaged page".into(),
            });
        }
        Ok(self.page(page)?.size)
    }

    fn render_page(&self, page: usize, scale: f32, rotation: Rotation) -> RedactorResult<RgbImage> {
        let size = self.page(page)?.size;
        if self.fail_render.contains(&page) {
            return Err(RedactorError::Render {
                page,
                message: "simulated render failure".into(),
            });
        }
        self.stats.renders.fetch_add(1, Ordering::SeqCst);
        let width = (size.width * scale).round().max(1.0) as u32;
        let height = (size.height * scale).round().max(1.0) as u32;
        let image = RgbImage::from_pixel(width, height, Rgb([PAPER[0], PAPER[1], page as u8]));
        Ok(rotate_image(image, rotation))
    }

    fn extract_structured_text(&self, page: usize) -> RedactorResult<Vec<TextBlock>> {
        Ok(self.page(page)?.blocks.clone())
    }

    fn search_literal(&self, page: usize, text: &str) -> RedactorResult<Vec<Quad>> {
        self.stats.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            return Err(RedactorError::BackendError {
                backend: "fake".into(),
                message: "search unavailable".into(),
                source: None,
            });
        }
        Ok(self
            .page(page)?
            .quads
            .get(text)
            .map(|rects| rects.iter().copied().map(quad).collect())
            .unwrap_or_default())
    }
}

/// What the fake engine "reads" on one page, in corrected user space.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    /// Corrected page width, used to recover the render scale.
    pub width: f32,
    pub lines: Vec<Vec<(String, Rect)>>,
    pub orientation: Option<OrientationEstimate>,
    pub fail: bool,
}

impl ScriptedPage {
    pub fn new(width: f32) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    pub fn with_line(mut self, words: &[(&str, Rect)]) -> Self {
        self.lines
            .push(words.iter().map(|(t, r)| (t.to_string(), *r)).collect());
        self
    }

    pub fn rotated(mut self, degrees: f32, confidence: f32) -> Self {
        self.orientation = Some(OrientationEstimate {
            rotation_degrees: degrees,
            confidence,
        });
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct OcrStats {
    pub created: Arc<AtomicUsize>,
    pub recognized: Arc<AtomicUsize>,
    pub orientation_checks: Arc<AtomicUsize>,
}

impl OcrStats {
    pub fn recognized(&self) -> usize {
        self.recognized.load(Ordering::SeqCst)
    }
}

pub struct FakeOcrEngine {
    script: Arc<HashMap<usize, ScriptedPage>>,
    stats: OcrStats,
    detector: bool,
}

fn page_of(image: &RgbImage) -> usize {
    image.get_pixel(0, 0).0[2] as usize
}

impl OcrEngine for FakeOcrEngine {
    fn recognize(&mut self, image: &RgbImage) -> RedactorResult<OcrPage> {
        self.stats.recognized.fetch_add(1, Ordering::SeqCst);
        let page = page_of(image);
        let Some(scripted) = self.script.get(&page) else {
            return Ok(OcrPage::default());
        };
        if scripted.fail {
            return Err(RedactorError::Ocr {
                page,
                message: "simulated engine failure".into(),
            });
        }
        let scale = image.width() as f32 / scripted.width;
        let lines = scripted
            .lines
            .iter()
            .map(|words| {
                let words: Vec<OcrWord> = words
                    .iter()
                    .map(|(text, rect)| OcrWord {
                        text: text.clone(),
                        bbox: rect.scale(scale),
                    })
                    .collect();
                let bbox = words
                    .iter()
                    .skip(1)
                    .fold(words[0].bbox, |acc, w| acc.union(&w.bbox));
                OcrLine {
                    text: words
                        .iter()
                        .map(|w| w.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" "),
                    bbox,
                    confidence: 0.9,
                    words,
                }
            })
            .collect();
        Ok(OcrPage { lines })
    }

    fn detect_orientation(
        &mut self,
        image: &RgbImage,
    ) -> RedactorResult<Option<OrientationEstimate>> {
        if !self.detector {
            return Ok(None);
        }
        self.stats.orientation_checks.fetch_add(1, Ordering::SeqCst);
        Ok(Some(
            self.script
                .get(&page_of(image))
                .and_then(|p| p.orientation)
                .unwrap_or(OrientationEstimate {
                    rotation_degrees: 0.0,
                    confidence: 10.0,
                }),
        ))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Builds [`FakeOcrEngine`]s sharing one script and one set of counters.
#[derive(Clone, Default)]
pub struct FakeOcrFactory {
    script: Arc<HashMap<usize, ScriptedPage>>,
    pub stats: OcrStats,
    fail_init: bool,
    without_detector: bool,
}

impl FakeOcrFactory {
    pub fn new(pages: Vec<(usize, ScriptedPage)>) -> Self {
        Self {
            script: Arc::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    pub fn without_detector(mut self) -> Self {
        self.without_detector = true;
        self
    }
}

impl OcrEngineFactory for FakeOcrFactory {
    fn create(&self, slot: usize) -> RedactorResult<Box<dyn OcrEngine>> {
        if self.fail_init {
            return Err(RedactorError::OcrInit {
                message: format!("no engine for slot {}", slot),
            });
        }
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeOcrEngine {
            script: Arc::clone(&self.script),
            stats: self.stats.clone(),
            detector: !self.without_detector,
        }))
    }
}

/// One call made against a [`RecordingWriter`].
#[derive(Debug, Clone)]
pub enum WriterOp {
    Begin(PageSpec),
    Image { page: usize, image: RgbImage },
    Copy { page: usize, source_page: usize },
}

/// Keeps every call in memory; can be told to refuse page copies.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub ops: Vec<WriterOp>,
    pub fail_copy: bool,
    pub finalized: bool,
    pages: usize,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing_copies() -> Self {
        Self {
            fail_copy: true,
            ..Self::default()
        }
    }

    pub fn specs(&self) -> Vec<PageSpec> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                WriterOp::Begin(spec) => Some(*spec),
                _ => None,
            })
            .collect()
    }

    pub fn image(&self, page: usize) -> Option<&RgbImage> {
        self.ops.iter().find_map(|op| match op {
            WriterOp::Image { page: p, image } if *p == page => Some(image),
            _ => None,
        })
    }

    pub fn copied(&self) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                WriterOp::Copy { source_page, .. } => Some(*source_page),
                _ => None,
            })
            .collect()
    }
}

impl DocumentWriter for RecordingWriter {
    fn begin_page(&mut self, spec: PageSpec) -> RedactorResult<PageHandle> {
        self.ops.push(WriterOp::Begin(spec));
        self.pages += 1;
        Ok(PageHandle(self.pages - 1))
    }

    fn draw_image(&mut self, page: PageHandle, image: &RgbImage) -> RedactorResult<()> {
        self.ops.push(WriterOp::Image {
            page: page.0,
            image: image.clone(),
        });
        Ok(())
    }

    fn copy_page_content(&mut self, page: PageHandle, source_page: usize) -> RedactorResult<()> {
        if self.fail_copy {
            return Err(RedactorError::Writer {
                message: format!("refusing to copy page {}", source_page),
                source: None,
            });
        }
        self.ops.push(WriterOp::Copy {
            page: page.0,
            source_page,
        });
        Ok(())
    }

    fn finalize(&mut self) -> RedactorResult<Vec<u8>> {
        self.finalized = true;
        Ok(b"%PDF-recorded".to_vec())
    }
}
