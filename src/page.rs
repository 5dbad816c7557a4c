//! Interfaces between the search core and the host viewer.
//!
//! The host owns the document, the page geometry and the notion of which
//! pages are on screen. The core only ever sees page text (through
//! [`PageSource`]), asks the [`Viewport`] where the user is, and hands
//! match offsets to a [`PageGeometry`] to turn them into positions.

use std::ops::Range;

use async_trait::async_trait;

use crate::error::SourceError;

// ---------------------------------------------------------------------------
// PageText
// ---------------------------------------------------------------------------

/// The text of one page as extracted by the host.
///
/// `char_offset_map[i]` is the index, in the host's per-character geometry
/// array, of the i-th char of `raw_text`. The core never interprets these
/// indices; it only passes them back through [`PageGeometry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_index: usize,
    pub raw_text: String,
    pub char_offset_map: Vec<usize>,
}

impl PageText {
    /// A page whose geometry array has one entry per char, in text order.
    pub fn plain(page_index: usize, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let char_offset_map = (0..raw_text.chars().count()).collect();
        Self {
            page_index,
            raw_text,
            char_offset_map,
        }
    }

    pub fn empty(page_index: usize) -> Self {
        Self::plain(page_index, String::new())
    }

    /// Geometry indices covered by the char span `[start, start + len)`.
    ///
    /// Out-of-range offsets are clamped to the page.
    pub fn geometry_range(&self, start: usize, len: usize) -> Range<usize> {
        let map = &self.char_offset_map;
        let Some(&last_index) = map.last() else {
            return 0..0;
        };
        let first = map.get(start).copied().unwrap_or(last_index + 1);
        let last = match (start + len).checked_sub(1) {
            Some(end) if len > 0 => map.get(end).copied().unwrap_or(last_index),
            _ => return first..first,
        };
        first..last.max(first) + 1
    }
}

// ---------------------------------------------------------------------------
// Host traits
// ---------------------------------------------------------------------------

/// A paginated document that can produce the text of its pages.
///
/// `page_text` is called once per page per document. It must resolve for
/// empty pages too (with an empty `raw_text`).
#[async_trait]
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    async fn page_text(&self, page_index: usize) -> Result<PageText, SourceError>;
}

/// Where the user currently is in the document.
pub trait Viewport: Send + Sync {
    /// The 1-based number of the current page.
    fn current_page_number(&self) -> usize;

    /// Whether the 1-based page `page_number` is at least partly on screen.
    fn is_page_visible(&self, _page_number: usize) -> bool {
        true
    }
}

/// A fixed viewport, for hosts without scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticViewport {
    pub current_page_number: usize,
}

impl Viewport for StaticViewport {
    fn current_page_number(&self) -> usize {
        self.current_page_number
    }
}

/// Turns geometry index ranges into the host's position type, e.g. a list
/// of rectangles.
pub trait PageGeometry {
    type Position;

    fn position(&self, geometry: Range<usize>) -> Self::Position;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_builds_identity_map() {
        let page = PageText::plain(2, "h\u{00E9}llo");
        assert_eq!(page.page_index, 2);
        assert_eq!(page.char_offset_map, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_geometry_range_follows_map() {
        let page = PageText {
            page_index: 0,
            raw_text: "ab\ncd".to_string(),
            // The newline has no glyph; the host maps it onto the next char.
            char_offset_map: vec![0, 1, 2, 2, 3],
        };
        assert_eq!(page.geometry_range(0, 2), 0..2);
        assert_eq!(page.geometry_range(3, 2), 2..4);
        assert_eq!(page.geometry_range(1, 3), 1..3);
    }

    #[test]
    fn test_geometry_range_clamps() {
        let page = PageText::plain(0, "abc");
        assert_eq!(page.geometry_range(2, 10), 2..3);
        assert_eq!(page.geometry_range(1, 0), 1..1);
        assert_eq!(PageText::empty(0).geometry_range(0, 3), 0..0);
    }

    #[test]
    fn test_static_viewport_assumes_visible() {
        let viewport = StaticViewport {
            current_page_number: 4,
        };
        assert_eq!(viewport.current_page_number(), 4);
        assert!(viewport.is_page_visible(1));
    }
}
