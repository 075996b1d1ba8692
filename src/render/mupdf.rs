//! MuPDF-backed [`PageRenderer`].

use super::{PageRenderer, MAX_SEARCH_HITS};
use crate::error::{RedactorError, RedactorResult};
use crate::geometry::{PageSize, Point, Quad, Rect};
use crate::model::{TextBlock, TextSource, Word};
use crate::transform::{rotate_image, Rotation};
use image::RgbImage;
use ::mupdf::pdf::PdfDocument;
use ::mupdf::{Colorspace, Matrix, Page, TextPageOptions};

pub struct MuPdfRenderer {
    document: PdfDocument,
    page_count: usize,
}

impl MuPdfRenderer {
    pub fn from_bytes(bytes: &[u8]) -> RedactorResult<Self> {
        let document = PdfDocument::from_bytes(bytes).map_err(|e| RedactorError::DocumentOpen {
            message: e.to_string(),
        })?;
        let page_count = document
            .page_count()
            .map_err(|e| RedactorError::DocumentOpen {
                message: format!("cannot count pages: {}", e),
            })?;
        log::debug!("opened document with {} page(s)", page_count);
        Ok(Self {
            document,
            page_count: page_count.max(0) as usize,
        })
    }

    fn load(&self, page: usize) -> RedactorResult<Page> {
        if page >= self.page_count {
            return Err(RedactorError::invalid_input(
                "page",
                format!("page {} out of range (document has {})", page, self.page_count),
            ));
        }
        self.document
            .load_page(page as i32)
            .map_err(|e| RedactorError::render(page, e))
    }
}

impl PageRenderer for MuPdfRenderer {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> RedactorResult<PageSize> {
        let bounds = self
            .load(page)?
            .bounds()
            .map_err(|e| RedactorError::render(page, e))?;
        Ok(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    fn render_page(&self, page: usize, scale: f32, rotation: Rotation) -> RedactorResult<RgbImage> {
        let loaded = self.load(page)?;
        let pixmap = loaded
            .to_pixmap(
                &Matrix::new_scale(scale, scale),
                &Colorspace::device_rgb(),
                false,
                true,
            )
            .map_err(|e| RedactorError::render(page, e))?;
        let image = samples_to_rgb(
            pixmap.samples(),
            pixmap.width(),
            pixmap.height(),
            pixmap.n() as usize,
        )
        .ok_or_else(|| RedactorError::render(page, "unexpected pixmap layout"))?;
        Ok(rotate_image(image, rotation))
    }

    fn extract_structured_text(&self, page: usize) -> RedactorResult<Vec<TextBlock>> {
        let text_page = self
            .load(page)?
            .to_text_page(TextPageOptions::empty())
            .map_err(|e| RedactorError::render(page, e))?;

        let mut blocks = Vec::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let mut words = Vec::new();
                let mut text = String::new();
                let mut bbox: Option<Rect> = None;

                for ch in line.chars() {
                    let Some(c) = ch.char() else {
                        continue;
                    };
                    if c.is_whitespace() {
                        flush_word(&mut words, &mut text, &mut bbox);
                        continue;
                    }
                    let q = ch.quad();
                    let glyph = Quad {
                        ul: Point::new(q.ul.x, q.ul.y),
                        ur: Point::new(q.ur.x, q.ur.y),
                        ll: Point::new(q.ll.x, q.ll.y),
                        lr: Point::new(q.lr.x, q.lr.y),
                    }
                    .bounds();
                    text.push(c);
                    bbox = Some(bbox.map_or(glyph, |b| b.union(&glyph)));
                }
                flush_word(&mut words, &mut text, &mut bbox);

                if let Some(block) = TextBlock::from_words(words, TextSource::Native) {
                    blocks.push(block);
                }
            }
        }
        Ok(blocks)
    }

    fn search_literal(&self, page: usize, text: &str) -> RedactorResult<Vec<Quad>> {
        let hits = self
            .load(page)?
            .search(text, MAX_SEARCH_HITS)
            .map_err(|e| RedactorError::BackendError {
                backend: "MuPDF".to_string(),
                message: format!("search failed on page {}", page),
                source: Some(Box::new(e)),
            })?;

        let mut quads = Vec::new();
        for quad in hits {
            quads.push(Quad {
                ul: Point::new(quad.ul.x, quad.ul.y),
                ur: Point::new(quad.ur.x, quad.ur.y),
                ll: Point::new(quad.ll.x, quad.ll.y),
                lr: Point::new(quad.lr.x, quad.lr.y),
            });
        }
        Ok(quads)
    }
}

fn flush_word(words: &mut Vec<Word>, text: &mut String, bbox: &mut Option<Rect>) {
    if let Some(rect) = bbox.take() {
        if !text.is_empty() {
            words.push(Word {
                text: std::mem::take(text),
                bbox: rect,
            });
        }
    }
    text.clear();
}

/// Copies interleaved pixmap samples into an RGB buffer.
///
/// Rows may be padded; only the first three channels of each pixel are
/// kept. Returns `None` when the buffer is too small for the dimensions.
fn samples_to_rgb(samples: &[u8], width: u32, height: u32, channels: usize) -> Option<RgbImage> {
    if channels < 3 || width == 0 || height == 0 {
        return None;
    }
    let row_len = width as usize * channels;
    let stride = samples.len() / height as usize;
    if stride < row_len {
        return None;
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for row in samples.chunks(stride).take(height as usize) {
        for pixel in row[..row_len].chunks_exact(channels) {
            rgb.extend_from_slice(&pixel[..3]);
        }
    }
    RgbImage::from_raw(width, height, rgb)
}
