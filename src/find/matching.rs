//! Exact matching of a compiled query against one page.

use regex::Regex;
use tracing::warn;

use super::state::FindState;
use crate::char_class::char_class;
use crate::normalize::{is_diacritic_exception, is_mark, NormalizedText, TextNormalizer};
use crate::query::{compile_query, CompileOptions};

// ---------------------------------------------------------------------------
// PageMatches
// ---------------------------------------------------------------------------

/// Matches of one page, as char offsets into the page's raw text, sorted
/// by position. `snippets[i]` is the context snippet of match `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMatches {
    pub positions: Vec<usize>,
    pub lengths: Vec<usize>,
    pub snippets: Vec<String>,
}

impl PageMatches {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// `(start, len)` of match `idx`.
    pub fn get(&self, idx: usize) -> Option<(usize, usize)> {
        Some((*self.positions.get(idx)?, *self.lengths.get(idx)?))
    }
}

// ---------------------------------------------------------------------------
// PageMatcher
// ---------------------------------------------------------------------------

/// A query compiled for pages with a given `has_diacritics` value.
#[derive(Debug, Clone)]
pub struct PageMatcher {
    regex: Option<Regex>,
    reject_trailing_marks: bool,
    entire_word: bool,
}

impl PageMatcher {
    pub fn new(normalizer: &TextNormalizer, state: &FindState, has_diacritics: bool) -> Self {
        let compiled = compile_query(
            normalizer,
            &state.query,
            CompileOptions {
                match_diacritics: state.match_diacritics,
                has_diacritics,
            },
        );
        let regex = compiled
            .to_regex(state.case_sensitive)
            .unwrap_or_else(|e| {
                warn!(pattern = %compiled.pattern, error = %e, "query pattern rejected");
                None
            });
        Self {
            regex,
            reject_trailing_marks: compiled.reject_trailing_marks,
            entire_word: state.entire_word,
        }
    }

    /// Find every match in `normalized` and map it back to original
    /// offsets. Returns `(start, len)` pairs; spans that map to nothing
    /// are dropped.
    pub fn find(&self, normalized: &NormalizedText) -> Vec<(usize, usize)> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };
        let text = normalized.text.as_str();
        let chars: Vec<char> = text.chars().collect();

        let mut results = Vec::new();
        // Byte offsets from the regex are turned into char offsets
        // incrementally, since matches arrive in ascending order.
        let mut byte_pos = 0;
        let mut char_pos = 0;
        let mut to_char = |byte: usize| {
            char_pos += text[byte_pos..byte].chars().count();
            byte_pos = byte;
            char_pos
        };

        for m in regex.find_iter(text) {
            let start = to_char(m.start());
            let end = to_char(m.end());
            let len = end - start;
            if len == 0 {
                continue;
            }
            if self.reject_trailing_marks
                && chars
                    .get(end)
                    .is_some_and(|&c| is_mark(c) && !is_diacritic_exception(c))
            {
                continue;
            }
            if self.entire_word && !is_entire_word(&chars, start, len) {
                continue;
            }
            let (orig_start, orig_len) = normalized.original_range(start, len);
            if orig_len > 0 {
                results.push((orig_start, orig_len));
            }
        }
        results
    }
}

/// Whether `chars[start..start + len]` is delimited by a change of
/// character class on both sides. Combining marks next to the boundary
/// belong to the char they follow and are skipped.
pub fn is_entire_word(chars: &[char], start: usize, len: usize) -> bool {
    let span = &chars[start..start + len];
    let (Some(&first), Some(&last)) = (
        span.iter().find(|&&c| !is_mark(c)),
        span.iter().rev().find(|&&c| !is_mark(c)),
    ) else {
        return true;
    };

    let before = chars[..start].iter().rev().find(|&&c| !is_mark(c));
    if before.is_some_and(|&c| char_class(c) == char_class(first)) {
        return false;
    }
    let after = chars[start + len..].iter().find(|&&c| !is_mark(c));
    if after.is_some_and(|&c| char_class(c) == char_class(last)) {
        return false;
    }
    true
}
