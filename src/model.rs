//! Core records passed between the engine stages.

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};

/// Term recorded on matches drawn by hand.
pub const MANUAL_TERM: &str = "manual";

/// Where a block's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    /// The document's own text layer.
    Native,
    /// Recognized from a rendered raster.
    Ocr,
}

/// A word-level sub-region of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bbox: Rect,
}

/// How much geometry is known inside a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockGeometry {
    /// Only the block box is known; characters are assumed equally wide.
    Uniform,
    /// Per-word boxes, ordered left to right.
    WordLevel(Vec<Word>),
}

/// Line-granularity unit of text on one page.
///
/// With word-level geometry, `text` is exactly the words joined by single
/// spaces. Boxes are in corrected page user space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub bbox: Rect,
    pub source: TextSource,
    pub geometry: BlockGeometry,
}

impl TextBlock {
    /// A block without word geometry.
    pub fn uniform(text: impl Into<String>, bbox: Rect, source: TextSource) -> Self {
        Self {
            text: text.into(),
            bbox,
            source,
            geometry: BlockGeometry::Uniform,
        }
    }

    /// A block assembled from words; text and box are derived from them.
    ///
    /// Returns `None` for an empty word list.
    pub fn from_words(words: Vec<Word>, source: TextSource) -> Option<Self> {
        let first = words.first()?;
        let bbox = words.iter().fold(first.bbox, |acc, w| acc.union(&w.bbox));
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Some(Self {
            text,
            bbox,
            source,
            geometry: BlockGeometry::WordLevel(words),
        })
    }

    pub fn words(&self) -> Option<&[Word]> {
        match &self.geometry {
            BlockGeometry::WordLevel(words) => Some(words),
            BlockGeometry::Uniform => None,
        }
    }
}

/// A redaction region on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub text: String,
    /// Named pattern key, raw user pattern, or [`MANUAL_TERM`].
    pub term: String,
    /// Corrected page user space.
    pub bbox: Rect,
    /// Zero-based page index.
    pub page: usize,
    #[serde(default)]
    pub is_manual: bool,
}

impl Match {
    pub fn manual(page: usize, bbox: Rect) -> Self {
        Self {
            text: String::new(),
            term: MANUAL_TERM.to_string(),
            bbox: bbox.normalized(),
            page,
            is_manual: true,
        }
    }
}
