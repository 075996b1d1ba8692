//! Redaction targeting engine for scanned and digitally authored PDFs.
//!
//! The engine finds sensitive text, resolves every hit to a precise
//! rectangle on the page and burns those rectangles into a rasterized
//! copy of the page, so the redacted text cannot be recovered from the
//! output document.
//!
//! # Features
//!
//! - **Named Patterns**: email, NANP phone numbers, dates, IBAN, Dutch BSN and
//!   credit card numbers, each with a checksum or calendar validator
//! - **User Patterns**: any regular expression, case-insensitive, with a
//!   literal fallback for expressions that do not compile
//! - **OCR**: pages without a text layer are recognized by a pool of
//!   engines, with orientation correction and a per-document cache
//! - **Precise Geometry**: word-level interpolation refined by exact glyph
//!   quads from the text layer
//! - **Destructive Output**: pages with matches are re-rendered and burned;
//!   pages without are copied unchanged
//!
//! # Architecture
//!
//! - [`domain`]: Pattern matching and validators
//! - [`transform`]: Conversions between page, pixel and display space
//! - [`ocr`]: Engine pool, orientation detection and block cache
//! - [`correlate`]: From a textual hit to a bounding box
//! - [`scan`]: The [`Session`] tying everything together
//! - [`store`]: Automatic and manual matches, drag handling
//! - [`redaction`]: Rasterize-and-burn with per-page copy fallback
//! - [`render`] and [`writer`]: MuPDF and lopdf backends behind traits
//!
//! # Quick Start
//!
//! ```no_run
//! use redactkit::{redact_pdf, scan_pdf, EngineConfig, TesseractConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("input.pdf")?;
//! let config = EngineConfig::default();
//!
//! let report = scan_pdf(&bytes, &["email", "iban"], &config, &TesseractConfig::default())?;
//! let output = redact_pdf(&bytes, &report.matches, &report.rotations(), &config)?;
//!
//! std::fs::write("redacted.pdf", &output.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Pattern Matching
//!
//! ```
//! use redactkit::domain::CompiledTerm;
//!
//! let term = CompiledTerm::compile("email").unwrap();
//! let hits = term.candidates("Contact: john@example.com");
//! assert_eq!(hits[0].text, "john@example.com");
//! assert_eq!(hits[0].char_start, 9);
//! ```

pub mod config;
pub mod correlate;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod model;
pub mod ocr;
pub mod redaction;
pub mod render;
pub mod scan;
pub mod store;
pub mod transform;
pub mod writer;

// Re-exports for convenient access
pub use config::{EngineConfig, ScanMode};
pub use domain::{CompiledTerm, NamedPattern, PatternMatcher};
pub use error::{RedactorError, RedactorResult};
pub use geometry::{PageSize, Point, Quad, Rect};
pub use model::{Match, TextBlock, TextSource};
pub use ocr::{OcrEngine, OcrEngineFactory, TesseractConfig};
pub use redaction::{redact_document, RedactionOutput, RedactionResult, Redactor};
pub use render::{MuPdfRenderer, PageRenderer};
pub use scan::{redact_pdf, scan_pdf, ScanProgress, ScanReport, Session};
pub use store::{DragState, DragTracker, MatchStore};
pub use transform::{PageGeometry, Rotation};
pub use writer::{DocumentWriter, LopdfWriter};
