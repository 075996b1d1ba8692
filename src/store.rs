//! Match store and the manual-drawing state machine.

use crate::error::{RedactorError, RedactorResult};
use crate::geometry::{Point, Rect};
use crate::model::Match;
use crate::transform::pdf_to_display;

/// An overlay rectangle for one match, in display pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    /// Position of the match in the store, usable with [`MatchStore::remove`].
    pub index: usize,
    pub rect: Rect,
    pub is_manual: bool,
}

/// Automatic and manual matches of the open document.
///
/// Manual matches come first, in the order they were drawn, followed by
/// automatic matches in ascending page order.
#[derive(Debug, Clone, Default)]
pub struct MatchStore {
    matches: Vec<Match>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Swaps the whole automatic subset for `automatic`; manual matches stay.
    pub fn replace_automatic(&mut self, mut automatic: Vec<Match>) -> &[Match] {
        self.matches.retain(|m| m.is_manual);
        automatic.retain(|m| !m.is_manual);
        automatic.sort_by_key(|m| m.page);
        self.matches.extend(automatic);
        &self.matches
    }

    /// Adds a hand-drawn box on `page` of a document with `page_count` pages.
    pub fn add_manual(&mut self, page: usize, bbox: Rect, page_count: usize) -> RedactorResult<&[Match]> {
        if page >= page_count {
            return Err(RedactorError::invalid_input(
                "page",
                format!("page {} out of range (document has {})", page, page_count),
            ));
        }
        let insert_at = self.matches.iter().take_while(|m| m.is_manual).count();
        self.matches.insert(insert_at, Match::manual(page, bbox));
        Ok(&self.matches)
    }

    /// Removes the match at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<Match> {
        (index < self.matches.len()).then(|| self.matches.remove(index))
    }

    pub fn clear(&mut self) {
        self.matches.clear();
    }

    pub fn for_page(&self, page: usize) -> impl Iterator<Item = (usize, &Match)> {
        self.matches
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.page == page)
    }

    /// Overlay rectangles for `page` on a preview rendered at
    /// `render_scale` and shown at `display_scale`.
    pub fn overlays(&self, page: usize, render_scale: f32, display_scale: f32) -> Vec<Overlay> {
        self.for_page(page)
            .map(|(index, m)| Overlay {
                index,
                rect: pdf_to_display(m.bbox, render_scale, display_scale),
                is_manual: m.is_manual,
            })
            .collect()
    }
}

/// Normalizes a drag gesture into a rectangle.
///
/// Returns `None` when either side is below `min_size`.
pub fn normalize_drag(a: Point, b: Point, min_size: f32) -> Option<Rect> {
    let rect = Rect::from_corners(a, b);
    (rect.width() >= min_size && rect.height() >= min_size).then_some(rect)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        page: usize,
        origin: Point,
        current: Point,
    },
    Committed {
        page: usize,
        rect: Rect,
    },
}

/// Tracks one pointer gesture in display coordinates.
#[derive(Debug, Clone)]
pub struct DragTracker {
    state: DragState,
    min_size: f32,
}

impl DragTracker {
    pub fn new(min_size: f32) -> Self {
        Self {
            state: DragState::Idle,
            min_size,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn begin(&mut self, page: usize, at: Point) {
        self.state = DragState::Dragging {
            page,
            origin: at,
            current: at,
        };
    }

    /// Moves the free corner; ignored unless dragging.
    pub fn update(&mut self, at: Point) {
        if let DragState::Dragging { current, .. } = &mut self.state {
            *current = at;
        }
    }

    /// The rectangle currently being drawn, not yet size-checked.
    pub fn preview(&self) -> Option<Rect> {
        match self.state {
            DragState::Dragging { origin, current, .. } => Some(Rect::from_corners(origin, current)),
            _ => None,
        }
    }

    /// Ends the gesture. Returns the committed page and display rectangle,
    /// or `None` for a gesture that was too small or never started.
    pub fn release(&mut self) -> Option<(usize, Rect)> {
        let DragState::Dragging { page, origin, current } = self.state else {
            return None;
        };
        match normalize_drag(origin, current, self.min_size) {
            Some(rect) => {
                self.state = DragState::Committed { page, rect };
                Some((page, rect))
            }
            None => {
                self.state = DragState::Idle;
                None
            }
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
