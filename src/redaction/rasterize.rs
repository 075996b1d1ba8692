//! Rasterize-and-burn and copy strategies.

use super::strategy::{PageJob, PageStrategy};
use crate::error::RedactorResult;
use crate::geometry::Rect;
use crate::render::PageRenderer;
use crate::transform::{bounded_scale, corrected_size, pdf_to_render, scale_for_dpi};
use crate::writer::DocumentWriter;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;

/// Renders the page and zeroes every pixel covered by a region.
///
/// The rendered raster replaces the page entirely, so nothing of the
/// original content survives, not even outside the burned regions.
#[derive(Debug, Clone)]
pub struct RasterizeStrategy {
    target_dpi: f32,
    max_dimension: u32,
}

impl RasterizeStrategy {
    pub fn new(target_dpi: f32, max_dimension: u32) -> Self {
        Self {
            target_dpi,
            max_dimension,
        }
    }

    /// Render scale for the corrected page of `job`.
    pub fn scale_for(&self, job: &PageJob) -> f32 {
        bounded_scale(
            corrected_size(job.intrinsic, job.rotation),
            scale_for_dpi(self.target_dpi),
            self.max_dimension,
        )
    }
}

impl Default for RasterizeStrategy {
    fn default() -> Self {
        Self::new(200.0, 4000)
    }
}

impl PageStrategy for RasterizeStrategy {
    fn apply(
        &self,
        job: &PageJob,
        renderer: &dyn PageRenderer,
        writer: &mut dyn DocumentWriter,
    ) -> RedactorResult<usize> {
        let scale = self.scale_for(job);
        let mut image = renderer.render_page(job.page, scale, job.rotation)?;
        let burned = burn_regions(&mut image, &job.regions, scale);
        log::debug!(
            "page {}: burned {} region(s) into {}x{} raster",
            job.page,
            burned,
            image.width(),
            image.height()
        );
        writer.draw_image(job.handle, &image)?;
        Ok(burned)
    }

    fn name(&self) -> &str {
        "rasterize"
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// Paints the whole page black without reading the source page.
///
/// Last resort for a page that can be neither rendered nor copied: every
/// region on it is destroyed along with the rest of its content.
#[derive(Debug, Clone)]
pub struct BlankStrategy {
    raster: RasterizeStrategy,
}

impl BlankStrategy {
    pub fn new(target_dpi: f32, max_dimension: u32) -> Self {
        Self {
            raster: RasterizeStrategy::new(target_dpi, max_dimension),
        }
    }
}

impl Default for BlankStrategy {
    fn default() -> Self {
        Self {
            raster: RasterizeStrategy::default(),
        }
    }
}

impl PageStrategy for BlankStrategy {
    fn apply(
        &self,
        job: &PageJob,
        _renderer: &dyn PageRenderer,
        writer: &mut dyn DocumentWriter,
    ) -> RedactorResult<usize> {
        let scale = self.raster.scale_for(job);
        let size = corrected_size(job.intrinsic, job.rotation);
        let width = (size.width * scale).round().max(1.0) as u32;
        let height = (size.height * scale).round().max(1.0) as u32;
        let image = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
        writer.draw_image(job.handle, &image)?;
        Ok(job.regions.len())
    }

    fn name(&self) -> &str {
        "blank"
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// Blacks out `regions` (user units) on a raster rendered at `scale`.
///
/// Edges are widened to whole pixels and clamped to the image. Returns
/// the number of regions that covered at least one pixel.
pub fn burn_regions(image: &mut RgbImage, regions: &[Rect], scale: f32) -> usize {
    let (width, height) = image.dimensions();
    let mut burned = 0;
    for region in regions {
        let px = pdf_to_render(region.normalized(), scale);
        let x0 = px.x0.floor().max(0.0) as u32;
        let y0 = px.y0.floor().max(0.0) as u32;
        let x1 = (px.x1.ceil().max(0.0) as u32).min(width);
        let y1 = (px.y1.ceil().max(0.0) as u32).min(height);
        if x1 <= x0 || y1 <= y0 {
            continue;
        }
        let rect = imageproc::rect::Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0);
        draw_filled_rect_mut(image, rect, Rgb([0, 0, 0]));
        burned += 1;
    }
    burned
}

/// Carries the source page over unchanged.
#[derive(Debug, Clone, Default)]
pub struct CopyStrategy;

impl PageStrategy for CopyStrategy {
    fn apply(
        &self,
        job: &PageJob,
        _renderer: &dyn PageRenderer,
        writer: &mut dyn DocumentWriter,
    ) -> RedactorResult<usize> {
        writer.copy_page_content(job.handle, job.page)?;
        Ok(0)
    }

    fn name(&self) -> &str {
        "copy"
    }

    fn is_destructive(&self) -> bool {
        false
    }
}
