//! Redaction applier.
//!
//! Pages carrying matches are rendered and burned with
//! [`RasterizeStrategy`]; pages without matches are carried over with
//! [`CopyStrategy`]. A failed copy falls back to rasterizing the page. A
//! page that cannot be rendered is emitted solid black by
//! [`BlankStrategy`], so no matched page is ever emitted intact and the
//! rest of the document is still written.

pub mod rasterize;
pub mod strategy;

pub use rasterize::{burn_regions, BlankStrategy, CopyStrategy, RasterizeStrategy};
pub use strategy::{PageJob, PageStrategy, RedactionResult};

use crate::config::EngineConfig;
use crate::error::{RedactorError, RedactorResult};
use crate::geometry::{PageSize, Rect};
use crate::model::Match;
use crate::render::PageRenderer;
use crate::transform::{corrected_size, Rotation};
use crate::writer::{DocumentWriter, PageSpec};
use std::collections::BTreeMap;

/// Size given to a blanked page whose dimensions cannot be read (US Letter).
const FALLBACK_PAGE_SIZE: PageSize = PageSize::new(612.0, 792.0);

/// Redacted document bytes plus statistics.
#[derive(Debug, Clone)]
pub struct RedactionOutput {
    pub bytes: Vec<u8>,
    pub result: RedactionResult,
}

/// Redaction service coordinating the page strategies.
pub struct Redactor {
    burn: Box<dyn PageStrategy>,
    copy: Box<dyn PageStrategy>,
    blank: Box<dyn PageStrategy>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Redactor {
    /// Creates a redactor with explicit strategies.
    ///
    /// `blank` must not read the source page; it is the fallback when
    /// `burn` cannot render it.
    pub fn new(
        burn: Box<dyn PageStrategy>,
        copy: Box<dyn PageStrategy>,
        blank: Box<dyn PageStrategy>,
    ) -> Self {
        Self { burn, copy, blank }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Box::new(RasterizeStrategy::new(
                config.redaction_dpi,
                config.max_render_dimension,
            )),
            Box::new(CopyStrategy),
            Box::new(BlankStrategy::new(
                config.redaction_dpi,
                config.max_render_dimension,
            )),
        )
    }

    /// Writes every page of `renderer`'s document to `writer`.
    ///
    /// `rotation` yields the orientation correction recorded for a page
    /// during the scan; match boxes are in that corrected space. Failures
    /// confined to one page degrade that page only; errors from the
    /// writer itself still abort.
    pub fn redact<F>(
        &self,
        renderer: &dyn PageRenderer,
        writer: &mut dyn DocumentWriter,
        matches: &[Match],
        rotation: F,
    ) -> RedactorResult<RedactionOutput>
    where
        F: Fn(usize) -> Rotation,
    {
        let page_count = renderer.page_count();
        let mut regions: BTreeMap<usize, Vec<Rect>> = BTreeMap::new();
        for m in matches {
            if m.page >= page_count {
                return Err(RedactorError::invalid_input(
                    "matches",
                    format!("match on page {} but document has {} page(s)", m.page, page_count),
                ));
            }
            regions.entry(m.page).or_default().push(m.bbox);
        }

        log::info!(
            "redacting {} region(s) on {} of {} page(s)",
            matches.len(),
            regions.len(),
            page_count
        );

        let mut result = RedactionResult::none();
        for page in 0..page_count {
            let rotation = rotation(page);
            let (intrinsic, readable) = match renderer.page_size(page) {
                Ok(size) => (size, true),
                Err(err) => {
                    log::warn!("page {}: cannot read page size ({})", page, err);
                    (FALLBACK_PAGE_SIZE, false)
                }
            };
            let handle = writer.begin_page(PageSpec {
                size: corrected_size(intrinsic, rotation),
                rotation,
            })?;
            let job = PageJob {
                page,
                handle,
                intrinsic,
                rotation,
                regions: regions.remove(&page).unwrap_or_default(),
            };

            if !readable {
                result.instances_redacted += self.blank.apply(&job, renderer, writer)?;
                result.pages_blanked += 1;
            } else if job.regions.is_empty() {
                match self.copy.apply(&job, renderer, writer) {
                    Ok(_) => {
                        result.pages_copied += 1;
                    }
                    Err(err) => {
                        log::warn!(
                            "page {}: {} failed ({}), falling back to {}",
                            page,
                            self.copy.name(),
                            err,
                            self.burn.name()
                        );
                        result.copy_fallbacks += 1;
                        self.burn_or_blank(&job, renderer, writer, &mut result)?;
                    }
                }
            } else {
                self.burn_or_blank(&job, renderer, writer, &mut result)?;
            }
            result.pages_processed += 1;
        }

        let bytes = writer.finalize()?;
        log::info!(
            "redaction finished: {} rasterized, {} copied, {} blanked, {} fallback(s)",
            result.pages_rasterized,
            result.pages_copied,
            result.pages_blanked,
            result.copy_fallbacks
        );
        Ok(RedactionOutput { bytes, result })
    }

    /// Burns `job`, blanking the page when it cannot be rendered.
    fn burn_or_blank(
        &self,
        job: &PageJob,
        renderer: &dyn PageRenderer,
        writer: &mut dyn DocumentWriter,
        result: &mut RedactionResult,
    ) -> RedactorResult<()> {
        match self.burn.apply(job, renderer, writer) {
            Ok(burned) => {
                result.instances_redacted += burned;
                result.pages_rasterized += 1;
            }
            Err(err) => {
                log::warn!(
                    "page {}: {} failed ({}), falling back to {}",
                    job.page,
                    self.burn.name(),
                    err,
                    self.blank.name()
                );
                result.instances_redacted += self.blank.apply(job, renderer, writer)?;
                result.pages_blanked += 1;
            }
        }
        Ok(())
    }
}

/// Redacts with the default strategies and no orientation correction.
pub fn redact_document(
    renderer: &dyn PageRenderer,
    writer: &mut dyn DocumentWriter,
    matches: &[Match],
) -> RedactorResult<RedactionOutput> {
    Redactor::default().redact(renderer, writer, matches, |_| Rotation::None)
}
