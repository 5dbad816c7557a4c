//! Compile user queries into regular expressions over normalized text.
//!
//! The query goes through the same [`TextNormalizer`] as page text, then
//! every character is rewritten so that the pattern tolerates the
//! differences normalization cannot remove:
//! - punctuation may be surrounded by any amount of whitespace
//!   (`"a.b"` also finds `"a . b"`);
//! - any whitespace run in the query matches one or more whitespace chars;
//! - unless diacritics must match, every letter may be followed by
//!   combining marks in the text and marks in the query are dropped.
//!
//! Special characters are always escaped, so no user input can produce an
//! invalid pattern.

use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::normalize::{is_diacritic_exception, TextNormalizer};

/// Tokenizer for query rewriting. Groups: 1 regex metacharacter,
/// 2 punctuation, 3 whitespace run, 4 combining mark, 5 letter.
static SPECIAL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([.*+?^${}()|\[\]\\])|(\p{P})|(\s+)|(\p{M})|(\p{L})").unwrap()
});

const TRAILING_SPACES: &str = r"\s*";
const MARKS: &str = r"\p{M}*";

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// What the user searches for: one string, or a list of alternatives of
/// which any may match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Query {
    Single(String),
    Alternatives(Vec<String>),
}

impl Default for Query {
    fn default() -> Self {
        Query::Single(String::new())
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Query::Single(s.to_string())
    }
}

impl From<Vec<String>> for Query {
    fn from(v: Vec<String>) -> Self {
        Query::Alternatives(v)
    }
}

impl Query {
    /// True when there is nothing to search for. Whitespace-only strings
    /// count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Query::Single(s) => s.trim().is_empty(),
            Query::Alternatives(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Accents in the query must match accents in the text exactly.
    pub match_diacritics: bool,
    /// The text being searched contains combining marks.
    pub has_diacritics: bool,
}

/// A query rewritten as a regex pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledQuery {
    pub pattern: String,
    /// A match immediately followed by a combining mark (other than the
    /// exception marks) must be discarded: with exact diacritic matching,
    /// `"a"` must not match the first half of `"a\u{301}"`.
    pub reject_trailing_marks: bool,
}

impl CompiledQuery {
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Build the regex, or `None` when there is nothing to match.
    pub fn to_regex(&self, case_sensitive: bool) -> Result<Option<Regex>, regex::Error> {
        if self.is_empty() {
            return Ok(None);
        }
        RegexBuilder::new(&self.pattern)
            .case_insensitive(!case_sensitive)
            .unicode(true)
            .build()
            .map(Some)
    }
}

/// Compile `query` for text with the given properties.
pub fn compile_query(
    normalizer: &TextNormalizer,
    query: &Query,
    options: CompileOptions,
) -> CompiledQuery {
    match query {
        Query::Single(q) => compile_one(normalizer, q, options),
        Query::Alternatives(list) => {
            // Reverse order puts "foobar" before "foo", so the longer
            // alternative wins at the same position.
            let mut list: Vec<&String> = list.iter().filter(|q| !q.trim().is_empty()).collect();
            list.sort();
            list.reverse();

            let mut compiled = CompiledQuery::default();
            let mut parts = Vec::with_capacity(list.len());
            for q in list {
                let part = compile_one(normalizer, q, options);
                if part.is_empty() {
                    continue;
                }
                compiled.reject_trailing_marks |= part.reject_trailing_marks;
                parts.push(format!("({})", part.pattern));
            }
            compiled.pattern = parts.join("|");
            compiled
        }
    }
}

fn compile_one(normalizer: &TextNormalizer, query: &str, options: CompileOptions) -> CompiledQuery {
    let CompileOptions {
        match_diacritics,
        has_diacritics,
    } = options;
    let normalized = normalizer.normalize(query);

    let rewritten = SPECIAL_CHARS_RE.replace_all(&normalized.text, |caps: &Captures| {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            return format!(r"\s*{}\s*", regex::escape(m.as_str()));
        }
        if caps.get(3).is_some() {
            return r"\s+".to_string();
        }
        let mark = caps.get(4).map(|m| m.as_str());
        let letter = caps.get(5).map(|m| m.as_str());
        if match_diacritics {
            return mark.or(letter).unwrap_or_default().to_string();
        }
        if let Some(mark) = mark {
            let keep = mark.chars().next().is_some_and(is_diacritic_exception);
            return if keep { mark.to_string() } else { String::new() };
        }
        let letter = letter.unwrap_or_default();
        if has_diacritics {
            return format!("{letter}{MARKS}");
        }
        letter.to_string()
    });

    let mut pattern = rewritten.into_owned();
    if let Some(stripped) = pattern.strip_suffix(TRAILING_SPACES) {
        pattern.truncate(stripped.len());
    }

    let reject_trailing_marks = match_diacritics && has_diacritics && !pattern.is_empty();
    CompiledQuery {
        pattern,
        reject_trailing_marks,
    }
}
