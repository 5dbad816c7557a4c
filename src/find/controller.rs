//! The find controller: incremental, cancellable search across pages.
//!
//! Page text is extracted once per document, all pages concurrently, and
//! normalized as it arrives. A query is matched page by page as text
//! becomes available. Navigation walks from the current page forward (or
//! backward), wrapping around the document; when it reaches a page whose
//! text is not there yet it records that page as the *resume* page and
//! stops until the text arrives.
//!
//! The controller is driven by the host:
//! - `find` / `find_again` / `close` are synchronous and react at once
//!   where they can;
//! - `process_next` awaits the next piece of background work (a page
//!   extraction or the debounce deadline) and applies it. It is cancel
//!   safe, so hosts can put it in a `tokio::select!` next to their own
//!   event sources.
//!
//! Everything the host needs to know is sent as [`FindEvent`]s.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn};

use super::event::{FindEvent, FindEventSender, MatchesCount};
use super::matching::{PageMatcher, PageMatches};
use super::state::{FindOptions, FindState, FindStatus, RequestKind, SearchCursor, Selected};
use crate::error::SourceError;
use crate::normalize::{NormalizedText, TextNormalizer};
use crate::page::{PageGeometry, PageSource, PageText, Viewport};
use crate::snippet::snippet_for_bytes;

// ---------------------------------------------------------------------------
// Extracted pages
// ---------------------------------------------------------------------------

/// Page text together with its normalized form.
#[derive(Debug, Clone)]
struct ExtractedPage {
    text: PageText,
    normalized: NormalizedText,
}

impl ExtractedPage {
    fn empty(page_index: usize) -> Self {
        Self {
            text: PageText::empty(page_index),
            normalized: NormalizedText::empty(),
        }
    }
}

type Extraction = (u64, usize, Result<ExtractedPage, SourceError>);

// ---------------------------------------------------------------------------
// FindController
// ---------------------------------------------------------------------------

pub struct FindController {
    viewport: Arc<dyn Viewport>,
    events: FindEventSender,
    options: FindOptions,
    normalizer: Arc<TextNormalizer>,

    source: Option<Arc<dyn PageSource>>,
    /// Bumped by `set_document`; extractions carry the value they started
    /// with.
    generation: u64,
    page_count: usize,
    extraction_started: bool,
    extractions: FuturesUnordered<BoxFuture<'static, Extraction>>,
    pages: Vec<Option<ExtractedPage>>,

    state: Option<FindState>,
    status: Option<FindStatus>,
    /// Matchers for pages without and with diacritics.
    matchers: [Option<PageMatcher>; 2],
    page_matches: Vec<Option<PageMatches>>,
    /// Pages that get matched as soon as their text arrives.
    pending_find_matches: HashSet<usize>,
    /// The page navigation is waiting on.
    resume_page_idx: Option<usize>,
    pages_to_search: isize,
    cursor: SearchCursor,
    selected: Option<Selected>,
    dirty_match: bool,
    highlight_matches: bool,
    matches_count_total: usize,
    /// Every page's snippets in document order, shared with the events.
    snippets: Arc<Vec<String>>,
    debounce_deadline: Option<Instant>,
}

impl FindController {
    pub fn new(
        viewport: Arc<dyn Viewport>,
        events: FindEventSender,
        options: FindOptions,
        normalizer: Arc<TextNormalizer>,
    ) -> Self {
        Self {
            viewport,
            events,
            options,
            normalizer,
            source: None,
            generation: 0,
            page_count: 0,
            extraction_started: false,
            extractions: FuturesUnordered::new(),
            pages: Vec::new(),
            state: None,
            status: None,
            matchers: [None, None],
            page_matches: Vec::new(),
            pending_find_matches: HashSet::new(),
            resume_page_idx: None,
            pages_to_search: 0,
            cursor: SearchCursor::default(),
            selected: None,
            dirty_match: false,
            highlight_matches: false,
            matches_count_total: 0,
            snippets: Arc::default(),
            debounce_deadline: None,
        }
    }

    // -- Host operations -----------------------------------------------------

    /// Bind the controller to a document, dropping everything known about
    /// the previous one. Does not start a search.
    pub fn set_document(&mut self, source: Option<Arc<dyn PageSource>>) {
        self.reset();
        self.generation += 1;
        self.page_count = source.as_ref().map_or(0, |s| s.page_count());
        self.pages = vec![None; self.page_count];
        self.page_matches = vec![None; self.page_count];
        self.source = source;
        debug!(
            generation = self.generation,
            pages = self.page_count,
            "document set"
        );
    }

    /// Handle a find request.
    pub fn find(&mut self, state: FindState) {
        let request = state.request;
        if self.state.is_none() || self.should_dirty(&state) {
            self.dirty_match = true;
        }
        if self
            .state
            .as_ref()
            .is_some_and(|prev| prev.matching_differs(&state))
        {
            self.matchers = [None, None];
        }
        self.state = Some(state);
        if request != Some(RequestKind::HighlightAllChange) {
            self.update_ui_state(FindStatus::Pending, false);
        }
        if self.source.is_none() {
            return;
        }

        self.extract_text();
        let findbar_closed = !self.highlight_matches;
        let pending_timeout = self.debounce_deadline.take().is_some();

        match request {
            None => {
                self.debounce_deadline = Some(Instant::now() + self.options.debounce);
                trace!(debounce = ?self.options.debounce, "search scheduled");
            }
            _ if self.dirty_match => self.next_match(),
            Some(RequestKind::Again) => {
                self.next_match();
                if findbar_closed && self.highlight_all() {
                    self.update_all_pages();
                }
            }
            Some(RequestKind::HighlightAllChange) => {
                if pending_timeout {
                    self.next_match();
                } else {
                    self.highlight_matches = true;
                }
                self.update_all_pages();
            }
            Some(RequestKind::New) => self.next_match(),
        }
    }

    /// Repeat the last request, going forward or backward.
    pub fn find_again(&mut self, find_previous: bool) {
        let Some(state) = self.state.clone() else {
            return;
        };
        self.find(FindState {
            find_previous,
            request: Some(RequestKind::Again),
            ..state
        });
    }

    /// The find surface was dismissed. Nothing found afterwards is
    /// selected until the next `find`.
    pub fn close(&mut self) {
        if self.source.is_none() {
            return;
        }
        self.debounce_deadline = None;
        if self.resume_page_idx.take().is_some() {
            self.dirty_match = true;
        }
        self.update_ui_state(FindStatus::Found, false);
        self.highlight_matches = false;
        self.update_all_pages();
    }

    /// Apply the next completed piece of background work. Returns `false`
    /// when there is nothing left to wait for.
    pub async fn process_next(&mut self) -> bool {
        let deadline = self.debounce_deadline;
        tokio::select! {
            Some((generation, page_idx, result)) = self.extractions.next(),
                if !self.extractions.is_empty() =>
            {
                self.on_page_extracted(generation, page_idx, result);
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                self.debounce_deadline = None;
                self.next_match();
            }
            else => return false,
        }
        true
    }

    /// Run background work until none is left.
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    /// Positions of the matches of `page_index`, converted by the host's
    /// geometry.
    pub fn match_positions<G: PageGeometry>(
        &self,
        page_index: usize,
        geometry: &G,
    ) -> Vec<G::Position> {
        let (Some(Some(page)), Some(Some(matches))) =
            (self.pages.get(page_index), self.page_matches.get(page_index))
        else {
            return Vec::new();
        };
        matches
            .positions
            .iter()
            .zip(&matches.lengths)
            .map(|(&start, &len)| geometry.position(page.text.geometry_range(start, len)))
            .collect()
    }

    // -- Accessors -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn state(&self) -> Option<&FindState> {
        self.state.as_ref()
    }

    /// The last status reported to the host.
    pub fn status(&self) -> Option<FindStatus> {
        self.status
    }

    pub fn selected(&self) -> Option<Selected> {
        self.selected
    }

    pub fn highlight_matches(&self) -> bool {
        self.highlight_matches
    }

    /// Match start offsets of a page, `None` until the page was searched.
    pub fn page_matches(&self, page_index: usize) -> Option<&[usize]> {
        self.page_matches
            .get(page_index)?
            .as_ref()
            .map(|m| m.positions.as_slice())
    }

    pub fn page_matches_length(&self, page_index: usize) -> Option<&[usize]> {
        self.page_matches
            .get(page_index)?
            .as_ref()
            .map(|m| m.lengths.as_slice())
    }

    pub fn normalized_page_text(&self, page_index: usize) -> Option<&str> {
        self.pages
            .get(page_index)?
            .as_ref()
            .map(|p| p.normalized.text.as_str())
    }

    /// Ordinal of the selected match and running totals.
    pub fn matches_count(&self) -> MatchesCount {
        let total = self.matches_count_total;
        let mut count = MatchesCount {
            total,
            snippets: Arc::clone(&self.snippets),
            ..MatchesCount::default()
        };
        let Some(selected) = self.selected else {
            return count;
        };

        let before: usize = self.page_matches[..selected.page_idx]
            .iter()
            .flatten()
            .map(PageMatches::len)
            .sum();
        let current = before + selected.match_idx + 1;
        if current > total {
            return count;
        }
        count.current = current;
        count.current_page_index = Some(selected.page_idx);
        if let Some((start, len)) = self.page_matches[selected.page_idx]
            .as_ref()
            .and_then(|m| m.get(selected.match_idx))
        {
            count.current_offset_start = Some(start);
            count.current_offset_end = Some(start + len);
        }
        count
    }

    // -- Internals -----------------------------------------------------------

    fn reset(&mut self) {
        self.source = None;
        self.page_count = 0;
        self.extraction_started = false;
        self.extractions = FuturesUnordered::new();
        self.pages.clear();
        self.state = None;
        self.status = None;
        self.matchers = [None, None];
        self.page_matches.clear();
        self.pending_find_matches.clear();
        self.resume_page_idx = None;
        self.pages_to_search = 0;
        self.cursor = SearchCursor::default();
        self.selected = None;
        self.dirty_match = false;
        self.highlight_matches = false;
        self.matches_count_total = 0;
        self.snippets = Arc::default();
        self.debounce_deadline = None;
    }

    fn find_previous(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.find_previous)
    }

    fn highlight_all(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.highlight_all)
    }

    fn query_is_empty(&self) -> bool {
        self.state.as_ref().map_or(true, |s| s.query.is_empty())
    }

    fn should_dirty(&self, state: &FindState) -> bool {
        let Some(prev) = &self.state else {
            return true;
        };
        if prev.matching_differs(state) {
            return true;
        }
        match state.request {
            Some(RequestKind::Again) => {
                // Re-home only when the user scrolled the selection away.
                let Some(selected) = self.selected else {
                    return false;
                };
                let page_number = selected.page_idx + 1;
                page_number <= self.page_count
                    && page_number != self.viewport.current_page_number()
                    && !self.viewport.is_page_visible(page_number)
            }
            Some(RequestKind::HighlightAllChange) => false,
            None | Some(RequestKind::New) => true,
        }
    }

    /// Start extracting every page, once per document.
    fn extract_text(&mut self) {
        if self.extraction_started {
            return;
        }
        let Some(source) = self.source.clone() else {
            return;
        };
        self.extraction_started = true;
        let generation = self.generation;
        for page_idx in 0..self.page_count {
            let source = Arc::clone(&source);
            let normalizer = Arc::clone(&self.normalizer);
            let extraction = async move {
                let result = source.page_text(page_idx).await.map(|text| {
                    let normalized = normalizer.normalize(&text.raw_text);
                    ExtractedPage { text, normalized }
                });
                (generation, page_idx, result)
            };
            self.extractions.push(extraction.boxed());
        }
        debug!(pages = self.page_count, "page text extraction started");
    }

    fn on_page_extracted(
        &mut self,
        generation: u64,
        page_idx: usize,
        result: Result<ExtractedPage, SourceError>,
    ) {
        if generation != self.generation || page_idx >= self.page_count {
            trace!(generation, page_idx, "stale page text dropped");
            return;
        }
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(page = page_idx, error = %e, "page text extraction failed");
                ExtractedPage::empty(page_idx)
            }
        };
        trace!(page = page_idx, chars = page.normalized.len(), "page text ready");
        self.pages[page_idx] = Some(page);
        if self.pending_find_matches.remove(&page_idx) {
            self.calculate_match(page_idx);
        }
    }

    fn calculate_match(&mut self, page_idx: usize) {
        if self.query_is_empty() {
            return;
        }
        let Some(has_diacritics) = self.pages[page_idx]
            .as_ref()
            .map(|p| p.normalized.has_diacritics)
        else {
            return;
        };
        let slot = usize::from(has_diacritics);
        if self.matchers[slot].is_none() {
            if let Some(state) = &self.state {
                self.matchers[slot] = Some(PageMatcher::new(&self.normalizer, state, has_diacritics));
            }
        }
        let (Some(matcher), Some(page)) = (&self.matchers[slot], &self.pages[page_idx]) else {
            return;
        };

        let raw = page.text.raw_text.as_str();
        let mut bytes = CharToByte::new(raw);
        let mut matches = PageMatches::default();
        for (start, len) in matcher.find(&page.normalized) {
            let byte_start = bytes.byte_at(start);
            let byte_end = bytes.byte_at(start + len);
            matches.positions.push(start);
            matches.lengths.push(len);
            matches.snippets.push(snippet_for_bytes(
                raw,
                byte_start..byte_end,
                self.options.snippet_words,
            ));
        }
        let found = matches.len();
        self.page_matches[page_idx] = Some(matches);
        self.matches_count_total += found;
        if found > 0 {
            self.collect_snippets();
        }
        trace!(page = page_idx, found, total = self.matches_count_total, "page matched");

        if self.highlight_all() {
            self.update_page(page_idx);
        }
        if self.resume_page_idx == Some(page_idx) {
            self.resume_page_idx = None;
            self.next_page_match();
        }
        if found > 0 {
            self.send(FindEvent::UpdateMatches {
                matches_count: self.matches_count(),
            });
        }
    }

    fn collect_snippets(&mut self) {
        let snippets = self
            .page_matches
            .iter()
            .flatten()
            .flat_map(|m| m.snippets.iter().cloned())
            .collect();
        self.snippets = Arc::new(snippets);
    }

    fn next_match(&mut self) {
        let previous = self.find_previous();
        let page_count = self.page_count;
        self.highlight_matches = true;

        if self.dirty_match {
            self.dirty_match = false;
            self.selected = None;
            self.cursor = SearchCursor {
                page_idx: self.current_page_index(),
                match_idx: None,
                wrapped: false,
            };
            self.resume_page_idx = None;
            self.page_matches = vec![None; page_count];
            self.matches_count_total = 0;
            self.snippets = Arc::default();
            self.update_all_pages();

            for page_idx in 0..page_count {
                if self.pending_find_matches.contains(&page_idx) {
                    continue;
                }
                if self.pages[page_idx].is_some() {
                    self.calculate_match(page_idx);
                } else {
                    self.pending_find_matches.insert(page_idx);
                }
            }
        }

        if self.query_is_empty() {
            self.update_ui_state(FindStatus::Found, false);
            return;
        }
        if page_count == 0 {
            self.update_match(false);
            return;
        }
        if self.resume_page_idx.is_some() {
            return;
        }

        self.pages_to_search = page_count as isize;
        if let Some(match_idx) = self.cursor.match_idx {
            let page_len = self.page_matches[self.cursor.page_idx]
                .as_ref()
                .map_or(0, PageMatches::len);
            if !previous && match_idx + 1 < page_len {
                self.cursor.match_idx = Some(match_idx + 1);
                self.update_match(true);
                return;
            }
            if previous && match_idx > 0 {
                self.cursor.match_idx = Some(match_idx - 1);
                self.update_match(true);
                return;
            }
            self.advance_offset_page(previous);
        }
        self.next_page_match();
    }

    /// Walk pages from the cursor until a page with matches, the search
    /// budget runs out, or a page that is not searched yet.
    fn next_page_match(&mut self) {
        if self.resume_page_idx.is_some() {
            warn!("a page is already awaited");
        }
        loop {
            let page_idx = self.cursor.page_idx;
            let Some(found) = self.page_matches[page_idx].as_ref().map(PageMatches::len) else {
                trace!(page = page_idx, "waiting for page text");
                self.resume_page_idx = Some(page_idx);
                return;
            };
            if self.matches_ready(found) {
                return;
            }
        }
    }

    fn matches_ready(&mut self, found: usize) -> bool {
        let previous = self.find_previous();
        if found > 0 {
            self.cursor.match_idx = Some(if previous { found - 1 } else { 0 });
            self.update_match(true);
            return true;
        }
        self.advance_offset_page(previous);
        if self.cursor.wrapped {
            self.cursor.match_idx = None;
            if self.pages_to_search < 0 {
                self.update_match(false);
                return true;
            }
        }
        false
    }

    fn advance_offset_page(&mut self, previous: bool) {
        let page_count = self.page_count;
        self.cursor.match_idx = None;
        self.pages_to_search -= 1;
        let next = if previous {
            self.cursor.page_idx.checked_sub(1)
        } else {
            Some(self.cursor.page_idx + 1).filter(|&p| p < page_count)
        };
        match next {
            Some(page_idx) => self.cursor.page_idx = page_idx,
            None => {
                self.cursor.page_idx = if previous { page_count - 1 } else { 0 };
                self.cursor.wrapped = true;
            }
        }
    }

    fn update_match(&mut self, found: bool) {
        let wrapped = std::mem::take(&mut self.cursor.wrapped);
        let mut status = FindStatus::NotFound;
        if found {
            let previous_page = self.selected.map(|s| s.page_idx);
            let selected = Selected {
                page_idx: self.cursor.page_idx,
                match_idx: self.cursor.match_idx.unwrap_or(0),
            };
            self.selected = Some(selected);
            status = if wrapped {
                FindStatus::Wrapped
            } else {
                FindStatus::Found
            };
            if let Some(page) = previous_page.filter(|&p| p != selected.page_idx) {
                self.update_page(page);
            }
            debug!(page = selected.page_idx, index = selected.match_idx, wrapped, "match selected");
            self.send(FindEvent::Navigate {
                page_idx: selected.page_idx,
                match_idx: selected.match_idx,
            });
        }
        self.update_ui_state(status, self.find_previous());
        if let Some(selected) = self.selected {
            self.update_page(selected.page_idx);
        }
    }

    fn current_page_index(&self) -> usize {
        self.viewport
            .current_page_number()
            .saturating_sub(1)
            .min(self.page_count.saturating_sub(1))
    }

    fn update_page(&self, page_idx: usize) {
        self.send(FindEvent::UpdatePageHighlights {
            page_idx: Some(page_idx),
        });
    }

    fn update_all_pages(&self) {
        self.send(FindEvent::UpdatePageHighlights { page_idx: None });
    }

    fn update_ui_state(&mut self, state: FindStatus, previous: bool) {
        self.status = Some(state);
        self.send(FindEvent::UpdateState {
            state,
            previous,
            entire_word: self.state.as_ref().is_some_and(|s| s.entire_word),
            matches_count: self.matches_count(),
            raw_query: self.state.as_ref().map(|s| s.query.clone()),
        });
    }

    fn send(&self, event: FindEvent) {
        // The host may have dropped the receiver; searching goes on.
        let _ = self.events.send(event);
    }
}

/// Char to byte offsets for ascending char positions in one pass.
struct CharToByte<'a> {
    text: &'a str,
    indices: std::str::CharIndices<'a>,
    chars_seen: usize,
    byte: usize,
}

impl<'a> CharToByte<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            indices: text.char_indices(),
            chars_seen: 0,
            byte: 0,
        }
    }

    /// Byte offset of char `pos`, or the text length past the end. Only
    /// a position behind the last one rescans from the start.
    fn byte_at(&mut self, pos: usize) -> usize {
        if pos < self.chars_seen {
            *self = Self::new(self.text);
        }
        while self.chars_seen < pos {
            self.chars_seen += 1;
            self.byte = self.indices.next().map_or(self.text.len(), |(i, c)| i + c.len_utf8());
        }
        self.byte
    }
}

/// Geometry that reports the raw index range, for hosts that only need
/// offsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexGeometry;

impl PageGeometry for IndexGeometry {
    type Position = Range<usize>;

    fn position(&self, geometry: Range<usize>) -> Range<usize> {
        geometry
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
