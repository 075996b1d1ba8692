//! Geometry correlation: from a textual hit to the tightest trustworthy box.
//!
//! Two sources of geometry are combined here. The estimate comes from the
//! block the hit was found in, interpolated across word boxes when the
//! block has them and across the whole block otherwise. For native text
//! the renderer can also return exact glyph quads for a literal search;
//! when one of those can be paired unambiguously with the estimate it
//! replaces it.

use crate::domain::Candidate;
use crate::geometry::Rect;
use crate::model::{BlockGeometry, TextBlock, Word};
use std::collections::{BTreeMap, HashMap};

/// Position of one character of block text inside its word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharSlot {
    pub word: usize,
    pub offset: usize,
}

/// Maps every character of `text` to its word, `None` for separators.
pub fn char_slots(text: &str, words: &[Word]) -> Vec<Option<CharSlot>> {
    let mut slots = Vec::with_capacity(text.len());
    let mut word = 0usize;
    let mut offset = 0usize;
    let mut in_word = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if in_word {
                word += 1;
                offset = 0;
                in_word = false;
            }
            slots.push(None);
            continue;
        }
        if word < words.len() {
            slots.push(Some(CharSlot { word, offset }));
        } else {
            slots.push(None);
        }
        offset += 1;
        in_word = true;
    }
    slots
}

/// Box for characters `[start, end)` interpolated across word boxes.
///
/// Fully covered words contribute their whole box; partially covered
/// words contribute a slice proportional to the character offsets.
/// Returns `None` when the range touches no word.
pub fn interpolate_words(text: &str, words: &[Word], start: usize, end: usize) -> Option<Rect> {
    let slots = char_slots(text, words);
    let mut touched: BTreeMap<usize, (usize, usize)> = BTreeMap::new();

    for slot in slots.iter().take(end).skip(start).flatten() {
        let span = touched
            .entry(slot.word)
            .or_insert((slot.offset, slot.offset + 1));
        span.0 = span.0.min(slot.offset);
        span.1 = span.1.max(slot.offset + 1);
    }

    touched
        .into_iter()
        .map(|(index, (from, to))| {
            let word = &words[index];
            let len = word.text.chars().count().max(1);
            if from == 0 && to >= len {
                word.bbox
            } else {
                let char_width = word.bbox.width() / len as f32;
                Rect::new(
                    word.bbox.x0 + char_width * from as f32,
                    word.bbox.y0,
                    word.bbox.x0 + char_width * to as f32,
                    word.bbox.y1,
                )
            }
        })
        .reduce(|acc, r| acc.union(&r))
}

/// Box for characters `[start, end)` assuming equally wide characters.
pub fn interpolate_uniform(block: &TextBlock, start: usize, end: usize) -> Rect {
    let len = block.text.chars().count();
    if len == 0 {
        return block.bbox;
    }
    let char_width = block.bbox.width() / len as f32;
    Rect::new(
        block.bbox.x0 + char_width * start as f32,
        block.bbox.y0,
        block.bbox.x0 + char_width * end.min(len) as f32,
        block.bbox.y1,
    )
}

/// Estimated box of a candidate inside its block.
pub fn estimate(block: &TextBlock, candidate: &Candidate) -> Rect {
    match &block.geometry {
        BlockGeometry::WordLevel(words) => {
            interpolate_words(&block.text, words, candidate.char_start, candidate.char_end)
                .unwrap_or_else(|| {
                    interpolate_uniform(block, candidate.char_start, candidate.char_end)
                })
        }
        BlockGeometry::Uniform => {
            interpolate_uniform(block, candidate.char_start, candidate.char_end)
        }
    }
}

/// Authoritative rectangles for one literal on one page.
#[derive(Debug, Clone, Default)]
struct GlyphRuns {
    rects: Vec<Rect>,
    used: Vec<bool>,
}

impl GlyphRuns {
    fn new(rects: Vec<Rect>) -> Self {
        let used = vec![false; rects.len()];
        Self { rects, used }
    }

    /// Consumes the unused run on the block's line nearest in X.
    fn take_nearest(&mut self, line: &Rect, estimate: &Rect) -> Option<Rect> {
        let mut best: Option<(usize, f32)> = None;
        for (i, rect) in self.rects.iter().enumerate() {
            if self.used[i] || !rect.overlaps_vertically(line) {
                continue;
            }
            let distance = (rect.x0 - estimate.x0).abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }
        let (index, _) = best?;
        self.used[index] = true;
        Some(self.rects[index])
    }
}

/// Pairs estimated boxes with exact glyph geometry.
///
/// Each authoritative rectangle is handed out at most once, so two hits
/// for the same literal on a page never collapse onto one glyph run.
/// State lives for one scan.
#[derive(Debug, Default)]
pub struct QuadCorrelator {
    runs: HashMap<(usize, String), GlyphRuns>,
}

impl QuadCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves one native-text hit.
    ///
    /// `search` is only invoked the first time a `(page, text)` pair is
    /// seen and must return the literal's glyph rectangles in corrected
    /// page space. Falls back to `estimate` when nothing qualifies.
    pub fn resolve<F>(
        &mut self,
        page: usize,
        text: &str,
        block: &TextBlock,
        estimate: Rect,
        search: F,
    ) -> Rect
    where
        F: FnOnce() -> Vec<Rect>,
    {
        let runs = self
            .runs
            .entry((page, text.to_string()))
            .or_insert_with(|| GlyphRuns::new(search()));
        runs.take_nearest(&block.bbox, &estimate).unwrap_or(estimate)
    }

    /// Rectangles still available for `(page, text)`.
    pub fn remaining(&self, page: usize, text: &str) -> usize {
        self.runs
            .get(&(page, text.to_string()))
            .map_or(0, |runs| runs.used.iter().filter(|u| !**u).count())
    }
}
