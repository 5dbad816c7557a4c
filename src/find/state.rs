//! Request and cursor types of the find controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::query::Query;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Why `find` was called. A `None` request kind is a fresh query typed by
/// the user, which is debounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Search now, from the current page.
    New,
    /// Go to the next (or previous) match of the current query.
    Again,
    /// Only the highlight-all flag changed.
    HighlightAllChange,
}

/// One find request. Each call to `find` passes a full snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindState {
    pub query: Query,
    pub case_sensitive: bool,
    pub entire_word: bool,
    pub match_diacritics: bool,
    pub highlight_all: bool,
    pub find_previous: bool,
    pub request: Option<RequestKind>,
}

impl FindState {
    pub fn new(query: impl Into<Query>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_request(mut self, request: RequestKind) -> Self {
        self.request = Some(request);
        self
    }

    /// True when the options that shape the match set differ.
    pub(crate) fn matching_differs(&self, other: &FindState) -> bool {
        self.query != other.query
            || self.case_sensitive != other.case_sensitive
            || self.entire_word != other.entire_word
            || self.match_diacritics != other.match_diacritics
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Outcome reported to the host after each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindStatus {
    Found,
    NotFound,
    /// Found, after passing the end (or start) of the document.
    Wrapped,
    /// Waiting for the debounce timer or for page text.
    Pending,
}

// ---------------------------------------------------------------------------
// Cursor and selection
// ---------------------------------------------------------------------------

/// Scan position while walking pages looking for the next match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchCursor {
    pub page_idx: usize,
    pub match_idx: Option<usize>,
    /// The scan crossed the document boundary since the last report.
    pub wrapped: bool,
}

/// The match currently reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selected {
    pub page_idx: usize,
    pub match_idx: usize,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);
pub const DEFAULT_SNIPPET_WORDS: usize = 8;

/// Controller tuning, normally taken from the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    /// Delay before a fresh query (request kind `None`) is searched.
    pub debounce: Duration,
    /// Context words per snippet.
    pub snippet_words: usize,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            snippet_words: DEFAULT_SNIPPET_WORDS,
        }
    }
}
