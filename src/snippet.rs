//! Short context snippets around a match, trimmed to whole words.

use std::ops::Range;

const ELLIPSIS: char = '\u{2026}';

/// Build a snippet for the match `[start, start + len)` (char offsets into
/// `text`).
///
/// `window` is the number of context words: each side keeps up to
/// `max(1, window / 2)` whole words. A word the match boundary falls inside
/// is always kept whole and glued to the match without a space. A side
/// gets an ellipsis when it holds more than `window` words. Whitespace
/// runs are collapsed to one space.
pub fn build_snippet(text: &str, start: usize, len: usize, window: usize) -> String {
    let byte_start = byte_offset(text, start);
    let byte_end = byte_start + byte_offset(&text[byte_start..], len);
    snippet_for_bytes(text, byte_start..byte_end, window)
}

/// [`build_snippet`] for a match given as a byte range, for callers that
/// walk many matches of one text in order.
pub fn snippet_for_bytes(text: &str, matched: Range<usize>, window: usize) -> String {
    let per_side = (window / 2).max(1);
    // One word past the window is enough to know an ellipsis is due.
    let limit = window.max(per_side) + 1;

    let before = &text[..matched.start];
    let after = &text[matched.end..];

    let (before_words, before_glued) = split_side(before.chars().rev(), true, limit);
    let (after_words, after_glued) = split_side(after.chars(), false, limit);

    let mut out = String::new();
    if before_words.len() > window {
        out.push(ELLIPSIS);
    }
    let kept_before = before_words.len().min(per_side);
    for word in before_words[..kept_before].iter().rev() {
        out.push_str(word);
        out.push(' ');
    }
    out.push_str(&before_glued);
    out.push_str(&collapse_whitespace(&text[matched]));
    out.push_str(&after_glued);
    for word in after_words.iter().take(per_side) {
        out.push(' ');
        out.push_str(word);
    }
    if after_words.len() > window {
        out.push(ELLIPSIS);
    }
    out
}

/// Split one side of the context, walking away from the match.
///
/// Returns up to `limit` separate words (nearest first, each in reading
/// order) and the fragment touching the match when the boundary is inside
/// a word. `reversed` is set when `chars` runs backwards from the match.
fn split_side(
    chars: impl Iterator<Item = char>,
    reversed: bool,
    limit: usize,
) -> (Vec<String>, String) {
    let mut glued = Vec::new();
    let mut words: Vec<Vec<char>> = Vec::new();
    let mut current: Vec<char> = Vec::new();
    let mut in_glued = true;

    for c in chars {
        if c.is_whitespace() {
            in_glued = false;
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
                if words.len() >= limit {
                    break;
                }
            }
            continue;
        }
        if in_glued {
            glued.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() && words.len() < limit {
        words.push(current);
    }

    let to_string = |mut w: Vec<char>| {
        if reversed {
            w.reverse();
        }
        w.into_iter().collect::<String>()
    };
    (words.into_iter().map(to_string).collect(), to_string(glued))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map_or(text.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet_for(text: &str, needle: &str, window: usize) -> String {
        let byte = text.find(needle).unwrap();
        let start = text[..byte].chars().count();
        build_snippet(text, start, needle.chars().count(), window)
    }

    #[test]
    fn test_small_window_without_ellipsis() {
        assert_eq!(
            snippet_for("The quick brown fox jumps", "brown", 2),
            "quick brown fox"
        );
    }

    #[test]
    fn test_ellipsis_when_side_exceeds_window() {
        let text = "one two three four five target six seven eight nine ten";
        assert_eq!(snippet_for(text, "target", 2), "\u{2026}five target six\u{2026}");
        assert_eq!(
            snippet_for(text, "target", 4),
            "\u{2026}four five target six seven\u{2026}"
        );
    }

    #[test]
    fn test_match_inside_word_is_glued() {
        assert_eq!(
            snippet_for("we concatenate strings here", "cat", 2),
            "we concatenate strings"
        );
    }

    #[test]
    fn test_match_at_text_edges() {
        assert_eq!(snippet_for("start of text", "start", 2), "start of");
        assert_eq!(snippet_for("end of text", "text", 2), "of text");
        assert_eq!(snippet_for("alone", "alone", 4), "alone");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        assert_eq!(
            snippet_for("left \n\n  right  match\tnext", "match", 2),
            "right match next"
        );
        assert_eq!(snippet_for("a  two\n words b", "two\n words", 2), "a two words b");
    }

    #[test]
    fn test_byte_range_matches_char_offsets() {
        let text = "caf\u{00E9} cr\u{00E8}me br\u{00FB}l\u{00E9}e";
        let byte = text.find("cr").unwrap();
        let by_bytes = snippet_for_bytes(text, byte..byte + "cr\u{00E8}me".len(), 2);
        assert_eq!(by_bytes, snippet_for(text, "cr\u{00E8}me", 2));
    }

    #[test]
    fn test_context_scan_stops_past_the_window() {
        let left = "word ".repeat(50_000);
        let text = format!("{left}target{}", " tail".repeat(50_000));
        let start = left.len();
        let snippet = snippet_for_bytes(&text, start..start + "target".len(), 4);
        assert_eq!(snippet, "\u{2026}word word target tail tail\u{2026}");
    }

    #[test]
    fn test_non_ascii_offsets_are_chars() {
        assert_eq!(
            snippet_for("caf\u{00E9} cr\u{00E8}me br\u{00FB}l\u{00E9}e", "cr\u{00E8}me", 2),
            "caf\u{00E9} cr\u{00E8}me br\u{00FB}l\u{00E9}e"
        );
    }
}
