//! Character classification for word-boundary tests.
//!
//! A whole-word match must start and end where the character class
//! changes. Classes are script aware: Han, Hiragana, Katakana, half-width
//! Katakana and Thai each form their own class, so a run of ideographs
//! is one "word" and a Latin word next to ideographs is a separate one.

/// Word class of a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Space,
    /// Letters, digits and underscore of alphabetic scripts.
    Alpha,
    Punct,
    Han,
    Katakana,
    Hiragana,
    HalfwidthKatakana,
    Thai,
}

/// Classify `c` for word-boundary purposes.
pub fn char_class(c: char) -> CharClass {
    let code = c as u32;
    // Everything below the CJK radicals block is an alphabetic script.
    if code < 0x2E80 {
        if c.is_ascii() {
            return match c {
                ' ' | '\t' | '\r' | '\n' => CharClass::Space,
                c if c.is_ascii_alphanumeric() || c == '_' => CharClass::Alpha,
                _ => CharClass::Punct,
            };
        }
        if code & 0xFF80 == 0x0E00 {
            return CharClass::Thai;
        }
        if code == 0xA0 {
            return CharClass::Space;
        }
        return CharClass::Alpha;
    }

    match code {
        0x3400..=0x9FFF | 0xF900..=0xFAFF => CharClass::Han,
        0x30A0..=0x30FF => CharClass::Katakana,
        0x3040..=0x309F => CharClass::Hiragana,
        0xFF60..=0xFF9F => CharClass::HalfwidthKatakana,
        _ => CharClass::Alpha,
    }
}

/// Code point ranges with the Unicode `Ideographic` property.
const IDEOGRAPHIC_RANGES: &[(u32, u32)] = &[
    (0x3006, 0x3007),
    (0x3021, 0x3029),
    (0x3038, 0x303A),
    (0x3400, 0x4DBF),
    (0x4E00, 0x9FFF),
    (0xF900, 0xFA6D),
    (0xFA70, 0xFAD9),
    (0x16FE4, 0x16FE4),
    (0x17000, 0x187F7),
    (0x18800, 0x18CD5),
    (0x18D00, 0x18D08),
    (0x1B170, 0x1B2FB),
    (0x20000, 0x2A6DF),
    (0x2A700, 0x2EBE0),
    (0x2F800, 0x2FA1D),
    (0x30000, 0x323AF),
];

/// Returns `true` for ideographs.
pub fn is_ideographic(c: char) -> bool {
    let code = c as u32;
    IDEOGRAPHIC_RANGES
        .iter()
        .any(|&(lo, hi)| (lo..=hi).contains(&code))
}

/// Ideographs plus Hiragana and Katakana: scripts written without spaces,
/// where a line break does not separate words.
pub fn is_ideographic_or_kana(c: char) -> bool {
    matches!(c as u32, 0x3040..=0x30FF) || is_ideographic(c)
}
