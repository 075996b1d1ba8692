//! Page rendering and native text access.
//!
//! A [`PageRenderer`] owns one open document. Geometry it reports is in
//! intrinsic page user space (top-left origin, y down); rasters it returns
//! already carry the requested orientation correction.

pub mod mupdf;

pub use self::mupdf::MuPdfRenderer;

use crate::error::RedactorResult;
use crate::geometry::{PageSize, Quad};
use crate::model::TextBlock;
use crate::transform::Rotation;
use image::RgbImage;

/// Upper bound on glyph runs returned by one literal search.
pub const MAX_SEARCH_HITS: u32 = 500;

pub trait PageRenderer {
    fn page_count(&self) -> usize;

    /// Intrinsic size of a page, before any orientation correction.
    fn page_size(&self, page: usize) -> RedactorResult<PageSize>;

    /// Rasterizes a page at `scale` pixels per unit, then rotates the
    /// raster clockwise by `rotation`.
    fn render_page(&self, page: usize, scale: f32, rotation: Rotation) -> RedactorResult<RgbImage>;

    /// Text layer of a page as line-level blocks with word geometry.
    fn extract_structured_text(&self, page: usize) -> RedactorResult<Vec<TextBlock>>;

    /// Exact glyph geometry of every occurrence of `text` on a page.
    fn search_literal(&self, page: usize, text: &str) -> RedactorResult<Vec<Quad>>;
}
