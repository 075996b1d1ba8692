//! Coordinate transform pipeline.
//!
//! Four spaces are involved, always converted in sequence:
//!
//! 1. **PDF user space**: page units, origin top-left, y grows downward
//!    (the convention MuPDF reports bounds and glyph quads in).
//! 2. **Render-pixel space**: user units multiplied by a render scale.
//! 3. **Rotation-corrected space**: the raster after a clockwise
//!    orientation correction of 0, 90, 180 or 270 degrees.
//! 4. **Display space**: render pixels multiplied by a display scale
//!    (on-screen width / underlying pixel width).
//!
//! Every function here is pure. Match boxes are stored in corrected user
//! space, so the forward path for an overlay is `pdf_to_display` and the
//! inverse path for a user-drawn box is `display_to_pdf`.

use crate::geometry::{PageSize, Rect};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Points per inch in PDF user space.
pub const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Clockwise correction applied to a rendered raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Snaps an arbitrary angle to the nearest quarter turn.
    pub fn nearest(degrees: f32) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        let quarter = ((normalized / 90.0).round() as u32) % 4;
        match quarter {
            1 => Self::Cw90,
            2 => Self::Cw180,
            3 => Self::Cw270,
            _ => Self::None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Cw90 => Self::Cw270,
            Self::Cw180 => Self::Cw180,
            Self::Cw270 => Self::Cw90,
        }
    }

    /// True for quarter turns that swap width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Cw90 | Self::Cw270)
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            90 => Ok(Self::Cw90),
            180 => Ok(Self::Cw180),
            270 => Ok(Self::Cw270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {}", other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Per-page geometry recorded when a page is rendered for preview or OCR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Width in user units after orientation correction.
    pub width: f32,
    /// Height in user units after orientation correction.
    pub height: f32,
    /// Pixels per user unit of the last render.
    pub render_scale: f32,
    pub rotation: Rotation,
}

impl PageGeometry {
    pub fn new(intrinsic: PageSize, render_scale: f32, rotation: Rotation) -> Self {
        let size = corrected_size(intrinsic, rotation);
        Self {
            width: size.width,
            height: size.height,
            render_scale,
            rotation,
        }
    }

    pub fn size(&self) -> PageSize {
        PageSize::new(self.width, self.height)
    }

    /// Pixel dimensions of a render at `render_scale`.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width * self.render_scale).round().max(1.0) as u32,
            (self.height * self.render_scale).round().max(1.0) as u32,
        )
    }
}

/// Page size once the rotation correction has been applied.
pub fn corrected_size(intrinsic: PageSize, rotation: Rotation) -> PageSize {
    if rotation.swaps_axes() {
        PageSize::new(intrinsic.height, intrinsic.width)
    } else {
        intrinsic
    }
}

/// Render scale (pixels per unit) for a resolution in DPI.
pub fn scale_for_dpi(dpi: f32) -> f32 {
    dpi / PDF_POINTS_PER_INCH
}

/// Slack kept below the pixel ceiling; renderers round pixmap bounds
/// outward, and `ceiling / size` can land a hair above the exact ratio.
const CEILING_SLACK: f32 = 0.01;

/// Largest scale not above `target` that keeps both pixel dimensions
/// within `max_dimension`, even when the pixel size is rounded up.
pub fn bounded_scale(size: PageSize, target: f32, max_dimension: u32) -> f32 {
    let ceiling = (max_dimension as f32 - CEILING_SLACK).max(CEILING_SLACK);
    let mut scale = target;
    if size.width > 0.0 {
        scale = scale.min(ceiling / size.width);
    }
    if size.height > 0.0 {
        scale = scale.min(ceiling / size.height);
    }
    scale
}

/// On-screen width divided by underlying pixel width.
pub fn display_scale(on_screen_width: f32, pixel_width: f32) -> f32 {
    if pixel_width <= 0.0 {
        return 1.0;
    }
    on_screen_width / pixel_width
}

pub fn pdf_to_render(rect: Rect, render_scale: f32) -> Rect {
    rect.scale(render_scale)
}

pub fn render_to_pdf(rect: Rect, render_scale: f32) -> Rect {
    rect.scale(1.0 / render_scale)
}

pub fn render_to_display(rect: Rect, display_scale: f32) -> Rect {
    rect.scale(display_scale)
}

pub fn display_to_render(rect: Rect, display_scale: f32) -> Rect {
    rect.scale(1.0 / display_scale)
}

/// Projects a stored match box onto the preview image.
pub fn pdf_to_display(rect: Rect, render_scale: f32, display_scale: f32) -> Rect {
    render_to_display(pdf_to_render(rect, render_scale), display_scale)
}

/// Maps a user-drawn display rectangle back to user space, normalized.
pub fn display_to_pdf(rect: Rect, render_scale: f32, display_scale: f32) -> Rect {
    render_to_pdf(display_to_render(rect, display_scale), render_scale).normalized()
}

/// Maps a rectangle from intrinsic page space into corrected space.
///
/// `intrinsic` is the size of the space `rect` lives in; the same
/// function works for user units and pixels.
pub fn rotate_rect(rect: Rect, rotation: Rotation, intrinsic: PageSize) -> Rect {
    let (w, h) = (intrinsic.width, intrinsic.height);
    let rotated = match rotation {
        Rotation::None => rect,
        Rotation::Cw90 => Rect::new(h - rect.y1, rect.x0, h - rect.y0, rect.x1),
        Rotation::Cw180 => Rect::new(w - rect.x1, h - rect.y1, w - rect.x0, h - rect.y0),
        Rotation::Cw270 => Rect::new(rect.y0, w - rect.x1, rect.y1, w - rect.x0),
    };
    rotated.normalized()
}

/// Inverse of [`rotate_rect`]: corrected space back to intrinsic space.
pub fn unrotate_rect(rect: Rect, rotation: Rotation, intrinsic: PageSize) -> Rect {
    rotate_rect(rect, rotation.inverse(), corrected_size(intrinsic, rotation))
}

/// Applies the clockwise correction to a rendered raster.
pub fn rotate_image(image: RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::None => image,
        Rotation::Cw90 => image::imageops::rotate90(&image),
        Rotation::Cw180 => image::imageops::rotate180(&image),
        Rotation::Cw270 => image::imageops::rotate270(&image),
    }
}
