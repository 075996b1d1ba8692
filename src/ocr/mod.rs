//! OCR: engine interface, pooled execution and the per-document orchestrator.
//!
//! Engines work in raster pixels. Everything leaving this module is in
//! corrected page user space: recognized boxes are divided by the render
//! scale of the image they were found in.

pub mod orchestrator;
pub mod pool;
pub mod tesseract;

pub use orchestrator::OcrOrchestrator;
pub use pool::{OcrPool, PageImage, PoolState};
pub use tesseract::{TesseractConfig, TesseractEngine, TesseractFactory};

use crate::error::RedactorResult;
use crate::geometry::Rect;
use crate::model::{TextBlock, TextSource, Word};
use image::RgbImage;

/// A recognized word, pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub bbox: Rect,
}

/// A recognized line, pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub bbox: Rect,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub words: Vec<OcrWord>,
}

/// Engine output for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrPage {
    pub lines: Vec<OcrLine>,
}

/// Result of an orientation detection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationEstimate {
    /// Clockwise correction, any angle; snapped to a quarter turn by the caller.
    pub rotation_degrees: f32,
    pub confidence: f32,
}

/// A text recognizer that can be pooled.
///
/// Each instance is used by one thread at a time.
pub trait OcrEngine: Send {
    fn recognize(&mut self, image: &RgbImage) -> RedactorResult<OcrPage>;

    /// Optional capability. `Ok(None)` means the engine has no detector.
    fn detect_orientation(
        &mut self,
        _image: &RgbImage,
    ) -> RedactorResult<Option<OrientationEstimate>> {
        Ok(None)
    }

    fn name(&self) -> &str;
}

/// Creates the engine instance for one pool slot.
pub trait OcrEngineFactory: Send + Sync {
    fn create(&self, slot: usize) -> RedactorResult<Box<dyn OcrEngine>>;
}

impl<F> OcrEngineFactory for F
where
    F: Fn(usize) -> RedactorResult<Box<dyn OcrEngine>> + Send + Sync,
{
    fn create(&self, slot: usize) -> RedactorResult<Box<dyn OcrEngine>> {
        self(slot)
    }
}

/// Converts engine output into blocks in page user space.
///
/// Lines with word boxes keep them; lines without fall back to uniform
/// geometry. Empty lines are dropped.
pub fn page_to_blocks(page: &OcrPage, render_scale: f32) -> Vec<TextBlock> {
    let unscale = |r: Rect| r.scale(1.0 / render_scale);

    page.lines
        .iter()
        .filter_map(|line| {
            let words: Vec<Word> = line
                .words
                .iter()
                .filter(|w| !w.text.trim().is_empty())
                .map(|w| Word {
                    text: w.text.trim().to_string(),
                    bbox: unscale(w.bbox),
                })
                .collect();
            if !words.is_empty() {
                return TextBlock::from_words(words, TextSource::Ocr);
            }
            let text = line.text.trim();
            if text.is_empty() {
                None
            } else {
                Some(TextBlock::uniform(text, unscale(line.bbox), TextSource::Ocr))
            }
        })
        .collect()
}
