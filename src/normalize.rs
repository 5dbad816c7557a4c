//! Search-facing text normalization with reversible offsets.
//!
//! Raw page text is rewritten into a form that is easier to match against:
//! - the text is canonically decomposed (NFD), so composed and decomposed
//!   accented letters look the same;
//! - typographic quotes, the Unicode hyphen and vulgar fractions become
//!   ASCII;
//! - compatibility characters (ligatures, full-width forms, superscripts)
//!   are replaced by their NFKC form;
//! - line breaks are reflowed: `"foo\nbar"` reads as `"foo bar"`,
//!   `"exam-\nple"` reads as `"example"`, an ideograph at the end of a line
//!   is joined to the next one without a space.
//!
//! Every transformation is recorded in a diff table so that a span found in
//! the normalized text can be mapped back to the span of the raw text it
//! came from. All offsets are `char` indices.

use std::collections::HashMap;

use unicode_normalization::char::{
    canonical_combining_class, decompose_canonical, is_combining_mark,
};
use unicode_normalization::UnicodeNormalization;

use crate::char_class::is_ideographic_or_kana;

// ---------------------------------------------------------------------------
// Character tables
// ---------------------------------------------------------------------------

/// Punctuation and fractions rewritten to plain ASCII before matching.
const CHARACTERS_TO_NORMALIZE: &[(char, &str)] = &[
    ('\u{2010}', "-"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201A}', "'"),
    ('\u{201B}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{201E}', "\""),
    ('\u{201F}', "\""),
    ('\u{00BC}', "1/4"),
    ('\u{00BD}', "1/2"),
    ('\u{00BE}', "3/4"),
];

/// Combining marks that are part of the letter they modify and are never
/// ignored when matching: kana voicing marks, viramas and a handful of
/// Telugu and Tibetan vowel signs.
pub const DIACRITICS_EXCEPTION: &[char] = &[
    // kana voicing
    '\u{3099}', '\u{309A}',
    // viramas
    '\u{094D}', '\u{09CD}', '\u{0A4D}', '\u{0ACD}', '\u{0B4D}', '\u{0BCD}', '\u{0C4D}',
    '\u{0CCD}', '\u{0D3B}', '\u{0D3C}', '\u{0D4D}', '\u{0DCA}', '\u{0E3A}', '\u{0EBA}',
    '\u{0F84}', '\u{1039}', '\u{103A}', '\u{1714}', '\u{1734}', '\u{17D2}', '\u{1A60}',
    '\u{1B44}', '\u{1BAA}', '\u{1BAB}', '\u{1BF2}', '\u{1BF3}', '\u{2D7F}', '\u{A806}',
    '\u{A82C}', '\u{A8C4}', '\u{A953}', '\u{A9C0}', '\u{AAF6}', '\u{ABED}',
    // combining classes 91, 129, 130 and 132
    '\u{0C56}', '\u{0F71}', '\u{0F72}', '\u{0F7A}', '\u{0F7B}', '\u{0F7C}', '\u{0F7D}',
    '\u{0F80}', '\u{0F74}',
];

const KANA_VOICING_MARKS: [char; 2] = ['\u{3099}', '\u{309A}'];

/// Returns `true` for combining marks that must be kept when diacritics
/// are ignored.
pub fn is_diacritic_exception(c: char) -> bool {
    DIACRITICS_EXCEPTION.contains(&c)
}

/// Returns `true` for any Unicode combining mark (`\p{M}`).
pub fn is_mark(c: char) -> bool {
    is_combining_mark(c)
}

// ---------------------------------------------------------------------------
// NormalizedText
// ---------------------------------------------------------------------------

/// The normalized form of a piece of text plus the table needed to map
/// normalized offsets back to the original.
///
/// `diffs` holds `(normalized_index, shift)` pairs sorted by index: from
/// `normalized_index` onward (until the next entry) a normalized offset `n`
/// corresponds to original offset `n + shift`. The first entry is always
/// `(0, 0)` and the last one is `(text_len, original_len - text_len)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub diffs: Vec<(usize, isize)>,
    pub has_diacritics: bool,
    len: usize,
    original_len: usize,
}

impl NormalizedText {
    /// An empty page: no text, identity mapping.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            diffs: vec![(0, 0)],
            has_diacritics: false,
            len: 0,
            original_len: 0,
        }
    }

    /// Length of the normalized text in chars.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length in chars of the text this was normalized from.
    pub fn original_len(&self) -> usize {
        self.original_len
    }

    fn shift_at(&self, pos: usize) -> isize {
        let idx = self.diffs.partition_point(|&(start, _)| start <= pos);
        self.diffs[idx.saturating_sub(1)].1
    }

    /// Map a single normalized offset to an original offset.
    pub fn original_offset(&self, pos: usize) -> usize {
        if pos >= self.len {
            return self.original_len;
        }
        apply_shift(pos, self.shift_at(pos))
    }

    /// Map the normalized span `[start, start + len)` to `(original_start,
    /// original_len)`.
    ///
    /// The end of the span is derived from its last char, so a match never
    /// swallows text removed right after it, except when the span runs to
    /// the end of the normalized text, in which case it runs to the end of
    /// the original too.
    pub fn original_range(&self, start: usize, len: usize) -> (usize, usize) {
        let orig_start = self.original_offset(start);
        if len == 0 {
            return (orig_start, 0);
        }
        let end = start + len;
        let orig_end = if end >= self.len {
            self.original_len
        } else {
            let last = end - 1;
            apply_shift(last, self.shift_at(last)) + 1
        };
        (orig_start, orig_end.saturating_sub(orig_start))
    }
}

fn apply_shift(pos: usize, shift: isize) -> usize {
    (pos as isize + shift).max(0) as usize
}

// ---------------------------------------------------------------------------
// TextNormalizer
// ---------------------------------------------------------------------------

/// Normalizes text for searching.
///
/// Construction scans the Basic Multilingual Plane once to find every
/// character with a distinct NFKC form; the instance is immutable
/// afterwards and can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    nfkc: HashMap<char, String>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// One char of the decomposed input, tagged with the index of the raw char
/// it came from.
#[derive(Debug, Clone, Copy)]
struct Decomposed {
    ch: char,
    origin: usize,
}

impl TextNormalizer {
    pub fn new() -> Self {
        let mut nfkc = HashMap::new();
        for code in 0u32..=0xFFFF {
            let Some(c) = char::from_u32(code) else {
                continue;
            };
            if is_mark(c) {
                continue;
            }
            if std::iter::once(c).nfkc().eq(std::iter::once(c)) {
                continue;
            }
            // Stored decomposed so the replacement matches the NFD text around it.
            nfkc.insert(c, std::iter::once(c).nfkd().collect());
        }
        Self { nfkc }
    }

    /// Normalize `text` and build its diff table.
    pub fn normalize(&self, text: &str) -> NormalizedText {
        let original_len = text.chars().count();
        let input = decompose(text);

        let mut out = String::with_capacity(text.len());
        let mut origins: Vec<usize> = Vec::with_capacity(input.len());
        let mut has_diacritics = false;

        fn emit(out: &mut String, origins: &mut Vec<usize>, ch: char, origin: usize) {
            out.push(ch);
            origins.push(origin);
        }

        let at = |k: usize| input.get(k).map(|d| d.ch);
        let dash_eol_at = |k: usize| at(k) == Some('-') && at(k + 1) == Some('\n');

        let mut k = 0;
        while k < input.len() {
            let Decomposed { ch, origin } = input[k];

            if let Some(&(_, replacement)) = CHARACTERS_TO_NORMALIZE.iter().find(|(c, _)| *c == ch) {
                for r in replacement.chars() {
                    emit(&mut out, &mut origins, r, origin);
                }
                k += 1;
                continue;
            }

            if let Some(replacement) = self.nfkc.get(&ch) {
                for r in replacement.chars() {
                    has_diacritics |= is_mark(r);
                    emit(&mut out, &mut origins, r, origin);
                }
                k += 1;
                continue;
            }

            if KANA_VOICING_MARKS.contains(&ch) && at(k + 1) == Some('\n') {
                has_diacritics = true;
                emit(&mut out, &mut origins, ch, origin);
                k += 2;
                continue;
            }

            if is_mark(ch) {
                has_diacritics = true;
                while let Some(d) = input.get(k).filter(|d| is_mark(d.ch)) {
                    emit(&mut out, &mut origins, d.ch, d.origin);
                    k += 1;
                }
                if dash_eol_at(k) {
                    k += 2;
                }
                continue;
            }

            if dash_eol_at(k + 1) {
                let next = at(k + 3);
                let broken_word = (ch.is_lowercase() && next.is_some_and(char::is_lowercase))
                    || (ch.is_uppercase() && next.is_some_and(char::is_alphabetic));
                if broken_word {
                    emit(&mut out, &mut origins, ch, origin);
                    k += 3;
                    continue;
                }
                if !ch.is_whitespace() {
                    emit(&mut out, &mut origins, ch, origin);
                    emit(&mut out, &mut origins, '-', input[k + 1].origin);
                    k += 3;
                    continue;
                }
            }

            if at(k + 1) == Some('\n') && is_ideographic_or_kana(ch) {
                emit(&mut out, &mut origins, ch, origin);
                k += 2;
                continue;
            }

            if ch == '\n' {
                emit(&mut out, &mut origins, ' ', origin);
                k += 1;
                continue;
            }

            emit(&mut out, &mut origins, ch, origin);
            k += 1;
        }

        let len = origins.len();
        let mut diffs: Vec<(usize, isize)> = vec![(0, 0)];
        for (n, &origin) in origins.iter().enumerate() {
            let shift = origin as isize - n as isize;
            let current = diffs.last().map_or(0, |&(_, s)| s);
            if shift != current {
                if n == 0 {
                    diffs[0].1 = shift;
                } else {
                    diffs.push((n, shift));
                }
            }
        }
        let final_shift = original_len as isize - len as isize;
        if len == 0 {
            diffs[0].1 = 0;
        } else {
            diffs.push((len, final_shift));
        }

        NormalizedText {
            text: out,
            diffs,
            has_diacritics,
            len,
            original_len,
        }
    }
}

/// Canonically decompose `text`, remembering for each produced char the
/// index of the raw char it came from.
///
/// Runs of non-starters are put in canonical order, as full NFD would do.
/// Their origins are kept ascending so the diff table stays monotonic.
fn decompose(text: &str) -> Vec<Decomposed> {
    let mut out: Vec<Decomposed> = Vec::with_capacity(text.len());
    for (origin, c) in text.chars().enumerate() {
        decompose_canonical(c, |ch| out.push(Decomposed { ch, origin }));
    }

    let mut k = 0;
    while k < out.len() {
        if canonical_combining_class(out[k].ch) == 0 {
            k += 1;
            continue;
        }
        let start = k;
        while k < out.len() && canonical_combining_class(out[k].ch) != 0 {
            k += 1;
        }
        let run = &mut out[start..k];
        if run.len() > 1 {
            let mut origins: Vec<usize> = run.iter().map(|d| d.origin).collect();
            origins.sort_unstable();
            run.sort_by_key(|d| canonical_combining_class(d.ch));
            for (d, origin) in run.iter_mut().zip(origins) {
                d.origin = origin;
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::OnceLock;

    fn normalizer() -> &'static TextNormalizer {
        static NORMALIZER: OnceLock<TextNormalizer> = OnceLock::new();
        NORMALIZER.get_or_init(TextNormalizer::new)
    }

    fn chars(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_plain_text_is_identity() {
        let n = normalizer().normalize("hello world");
        assert_eq!(n.text, "hello world");
        assert_eq!(n.diffs, vec![(0, 0), (11, 0)]);
        assert!(!n.has_diacritics);
        assert_eq!(n.original_range(6, 5), (6, 5));
    }

    #[test]
    fn test_empty_text() {
        let n = normalizer().normalize("");
        assert_eq!(n.text, "");
        assert_eq!(n.diffs, vec![(0, 0)]);
        assert_eq!(n.original_range(0, 0), (0, 0));
    }

    #[test]
    fn test_curly_quotes_become_straight() {
        let n = normalizer().normalize("\u{201C}abc\u{201D}");
        assert_eq!(n.text, "\"abc\"");
        // Same length, so every offset maps to itself.
        assert_eq!(n.original_range(0, 1), (0, 1));
        assert_eq!(n.original_range(1, 3), (1, 3));
        assert_eq!(n.original_range(4, 1), (4, 1));
    }

    #[test]
    fn test_fraction_expands_and_maps_back_to_single_char() {
        let n = normalizer().normalize("a\u{00BD}b");
        assert_eq!(n.text, "a1/2b");
        // "1/2" all comes from the fraction at original index 1.
        assert_eq!(n.original_range(1, 3), (1, 1));
        assert_eq!(n.original_range(4, 1), (2, 1));
    }

    #[test]
    fn test_ligature_uses_nfkc() {
        let n = normalizer().normalize("\u{FB01}ne");
        assert_eq!(n.text, "fine");
        assert_eq!(n.original_range(0, 4), (0, 3));
        assert_eq!(n.original_range(2, 2), (1, 2));
    }

    #[test]
    fn test_fullwidth_letters_use_nfkc() {
        let n = normalizer().normalize("\u{FF21}\u{FF22}");
        assert_eq!(n.text, "AB");
    }

    #[test]
    fn test_newline_becomes_space() {
        let n = normalizer().normalize("foo\nbar");
        assert_eq!(n.text, "foo bar");
        assert_eq!(n.original_range(4, 3), (4, 3));
    }

    #[test]
    fn test_broken_word_is_joined() {
        let n = normalizer().normalize("exam-\nple text");
        assert_eq!(n.text, "example text");
        // "example" spans the removed "-\n".
        assert_eq!(n.original_range(0, 7), (0, 9));
        assert_eq!(n.original_range(8, 4), (10, 4));
    }

    #[test]
    fn test_capitalized_broken_word_is_joined() {
        let n = normalizer().normalize("NEW-\nYork");
        assert_eq!(n.text, "NEWYork");
        // Lowercase before the hyphen and uppercase after: a compound.
        let n = normalizer().normalize("New-\nYork");
        assert_eq!(n.text, "New-York");
    }

    #[test]
    fn test_compound_word_keeps_hyphen() {
        let n = normalizer().normalize("well-\nKnown 2-\n3");
        assert_eq!(n.text, "well-Known 2-3");
        assert_eq!(n.original_range(5, 5), (6, 5));
    }

    #[test]
    fn test_ideograph_before_newline_has_no_space() {
        let n = normalizer().normalize("\u{6F22}\n\u{5B57}");
        assert_eq!(n.text, "\u{6F22}\u{5B57}");
        assert_eq!(n.original_range(1, 1), (2, 1));
    }

    #[test]
    fn test_kana_voicing_mark_before_newline() {
        let n = normalizer().normalize("\u{30AB}\u{3099}\n\u{30AD}");
        assert_eq!(n.text, "\u{30AB}\u{3099}\u{30AD}");
        assert!(n.has_diacritics);
        assert_eq!(n.original_range(2, 1), (3, 1));
    }

    #[test]
    fn test_composed_accent_is_decomposed_and_attributed_to_base() {
        let n = normalizer().normalize("caf\u{00E9}s");
        assert_eq!(n.text, "cafe\u{0301}s");
        assert!(n.has_diacritics);
        // The base letter plus its mark map to the single composed char.
        assert_eq!(n.original_range(3, 2), (3, 1));
        assert_eq!(n.original_range(5, 1), (4, 1));
    }

    #[test]
    fn test_already_decomposed_accent_keeps_offsets() {
        let n = normalizer().normalize("cafe\u{0301}s");
        assert_eq!(n.text, "cafe\u{0301}s");
        assert_eq!(n.original_range(3, 2), (3, 2));
    }

    #[test]
    fn test_marks_followed_by_dash_eol_are_joined() {
        let n = normalizer().normalize("caf\u{00E9}-\nbar");
        assert_eq!(n.text, "cafe\u{0301}bar");
        assert_eq!(n.original_range(5, 3), (6, 3));
    }

    #[test]
    fn test_hangul_syllable_maps_back_to_single_char() {
        let n = normalizer().normalize("\u{D55C}\u{AE00}");
        // Each syllable decomposes into jamo.
        assert_eq!(n.text, "\u{D55C}\u{AE00}".nfd().collect::<String>());
        let first_len = "\u{D55C}".nfd().count();
        assert_eq!(n.original_range(0, first_len), (0, 1));
        assert_eq!(n.original_range(first_len, n.len() - first_len), (1, 1));
    }

    #[test]
    fn test_mark_runs_are_canonically_ordered() {
        // dot above (230) before dot below (220) in the raw text.
        let n = normalizer().normalize("a\u{0307}\u{0323}");
        assert_eq!(n.text, "a\u{0323}\u{0307}");
    }

    #[rstest]
    #[case("")]
    #[case("plain text")]
    #[case("\u{201C}quoted\u{201D}")]
    #[case("one \u{00BC} two \u{00BE}")]
    #[case("hy-\nphen and com-\nPound")]
    #[case("caf\u{00E9} na\u{00EF}ve r\u{00E9}sum\u{00E9}")]
    #[case("\u{D55C}\u{AD6D}\u{C5B4} text")]
    #[case("\u{6F22}\n\u{5B57}\n")]
    #[case("trailing-\n")]
    #[case("\u{FB01}\u{FB02}")]
    fn test_full_range_round_trips(#[case] text: &str) {
        let n = normalizer().normalize(text);
        assert_eq!(n.original_range(0, n.len()), (0, chars(text)));
        assert_eq!(n.diffs[0].0, 0);
        assert_eq!(n.diffs.last().map(|d| d.0), Some(n.len()));
    }

    #[test]
    fn test_diffs_are_sorted() {
        let n = normalizer().normalize("a\u{00BD}-\nb caf\u{00E9}\n\u{D55C}");
        assert!(n.diffs.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_nfkc_table_skips_marks() {
        // U+0340 has a singleton decomposition but is a mark.
        assert!(!normalizer().nfkc.contains_key(&'\u{0340}'));
        assert!(normalizer().nfkc.contains_key(&'\u{FB01}'));
    }
}
