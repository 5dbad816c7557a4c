//! Events sent from the find controller to the host.
//!
//! The controller owns the sending half of an unbounded tokio channel; the
//! host drains the receiver and reacts (scrolling, redrawing highlights,
//! updating the find bar).

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use super::state::FindStatus;
use crate::query::Query;

// ---------------------------------------------------------------------------
// MatchesCount
// ---------------------------------------------------------------------------

/// Running totals reported alongside state changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchesCount {
    /// 1-based ordinal of the selected match, 0 when nothing is selected.
    pub current: usize,
    /// Matches found so far across all searched pages.
    pub total: usize,
    pub current_page_index: Option<usize>,
    /// Char offsets of the selected match in its page's raw text.
    pub current_offset_start: Option<usize>,
    pub current_offset_end: Option<usize>,
    /// One snippet per match found so far, in document order. Shared by
    /// every count taken until the next page is matched.
    pub snippets: Arc<Vec<String>>,
}

// ---------------------------------------------------------------------------
// FindEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FindEvent {
    /// A new match was selected; the host should bring it into view.
    Navigate { page_idx: usize, match_idx: usize },
    /// More matches were found while pages were being searched.
    UpdateMatches { matches_count: MatchesCount },
    UpdateState {
        state: FindStatus,
        previous: bool,
        entire_word: bool,
        matches_count: MatchesCount,
        raw_query: Option<Query>,
    },
    /// Highlights of one page (or of every page when `None`) are stale.
    UpdatePageHighlights { page_idx: Option<usize> },
}

pub type FindEventSender = mpsc::UnboundedSender<FindEvent>;
pub type FindEventReceiver = mpsc::UnboundedReceiver<FindEvent>;

/// Create the channel a controller reports on.
pub fn channel() -> (FindEventSender, FindEventReceiver) {
    mpsc::unbounded_channel()
}

/// Drain every event currently queued, without waiting.
pub fn drain(rx: &mut FindEventReceiver) -> Vec<FindEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
