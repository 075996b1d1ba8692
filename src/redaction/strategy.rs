//! Per-page redaction strategy trait and supporting types.
//!
//! Every output page is produced by exactly one strategy: pages with
//! matches are rasterized and burned, pages without are copied, and a
//! page that cannot be rendered is blanked.

use crate::error::RedactorResult;
use crate::geometry::{PageSize, Rect};
use crate::render::PageRenderer;
use crate::transform::Rotation;
use crate::writer::{DocumentWriter, PageHandle};

/// One page to emit.
#[derive(Debug, Clone)]
pub struct PageJob {
    pub page: usize,
    pub handle: PageHandle,
    /// Intrinsic page size, before orientation correction.
    pub intrinsic: PageSize,
    pub rotation: Rotation,
    /// Regions to destroy, corrected page user space.
    pub regions: Vec<Rect>,
}

/// Statistics about a redaction operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactionResult {
    /// Regions burned into page rasters
    pub instances_redacted: usize,

    /// Pages written to the output
    pub pages_processed: usize,

    /// Pages emitted as redacted rasters
    pub pages_rasterized: usize,

    /// Pages copied without changes
    pub pages_copied: usize,

    /// Pages whose copy failed and were rasterized instead
    pub copy_fallbacks: usize,

    /// Pages that could not be rendered and were emitted solid black
    pub pages_blanked: usize,
}

impl RedactionResult {
    /// Creates a result indicating no redactions were needed.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if any redactions were applied.
    pub fn has_redactions(&self) -> bool {
        self.instances_redacted > 0
    }
}

/// Strategy for emitting one output page.
pub trait PageStrategy {
    /// Writes `job` into the page already opened in `writer`.
    ///
    /// # Returns
    /// Number of regions destroyed on the page
    fn apply(
        &self,
        job: &PageJob,
        renderer: &dyn PageRenderer,
        writer: &mut dyn DocumentWriter,
    ) -> RedactorResult<usize>;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &str;

    /// Returns whether page content is destroyed rather than carried over.
    fn is_destructive(&self) -> bool;
}
