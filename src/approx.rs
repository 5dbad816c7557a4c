//! Approximate string matching with Myers' bit-parallel algorithm.
//!
//! Finds every place where `pattern` occurs in `text` with at most
//! `max_errors` edits (insertions, deletions, substitutions). The edit
//! matrix column is kept as bit vectors of vertical score deltas, 32
//! pattern characters per block, so each text character costs one pass of
//! word operations per active block.
//!
//! Only the matches with the lowest error count are reported. Each match is
//! found in two passes: a forward scan yields the match ends, then a scan of
//! the reversed text and pattern ending at each end yields its start.
//!
//! Offsets are `char` indices into `text`.

use std::collections::HashMap;

use serde::Serialize;

/// Pattern characters per block.
const WORD: usize = 32;

/// One approximate occurrence of the pattern: `text[start..end]` is within
/// `errors` edits of the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ApproximateMatch {
    pub start: usize,
    pub end: usize,
    pub errors: usize,
}

/// Bit vectors for one column of the edit matrix.
struct Blocks {
    /// Positive vertical deltas, one word per block.
    p: Vec<u32>,
    /// Negative vertical deltas.
    m: Vec<u32>,
    /// Bit of the last pattern row inside each block.
    last_row_mask: Vec<u32>,
}

/// Per-character match masks: for each distinct pattern char, one word per
/// block with the bits of the positions where it occurs.
struct Peq {
    ascii: Vec<Option<usize>>,
    other: HashMap<char, usize>,
    rows: Vec<Vec<u32>>,
    empty: Vec<u32>,
}

impl Peq {
    fn new(pattern: &[char], blocks: usize) -> Self {
        let mut peq = Self {
            ascii: vec![None; 128],
            other: HashMap::new(),
            rows: Vec::new(),
            empty: vec![0; blocks],
        };
        for &ch in pattern {
            if peq.row_index(ch).is_some() {
                continue;
            }
            let mut row = vec![0u32; blocks];
            for (idx, &pc) in pattern.iter().enumerate() {
                if pc == ch {
                    row[idx / WORD] |= 1 << (idx % WORD);
                }
            }
            let index = peq.rows.len();
            peq.rows.push(row);
            if ch.is_ascii() {
                peq.ascii[ch as usize] = Some(index);
            } else {
                peq.other.insert(ch, index);
            }
        }
        peq
    }

    fn row_index(&self, ch: char) -> Option<usize> {
        if ch.is_ascii() {
            self.ascii[ch as usize]
        } else {
            self.other.get(&ch).copied()
        }
    }

    fn row(&self, ch: char) -> &[u32] {
        match self.row_index(ch) {
            Some(index) => &self.rows[index],
            None => &self.empty,
        }
    }
}

fn one_if_not_zero(n: u32) -> i32 {
    (n != 0) as i32
}

/// Advance block `b` by one text character and return the score change at
/// its bottom row. `h_in` is the horizontal delta carried in from the block
/// above (-1, 0 or 1).
fn advance_block(blocks: &mut Blocks, peq: &[u32], b: usize, h_in: i32) -> i32 {
    let mut pv = blocks.p[b];
    let mut mv = blocks.m[b];
    let h_in_is_negative = (h_in < 0) as u32;
    let eq = peq[b] | h_in_is_negative;

    let xv = eq | mv;
    let xh = ((eq & pv).wrapping_add(pv) ^ pv) | eq;
    let mut ph = mv | !(xh | pv);
    let mut mh = pv & xh;

    let h_out = one_if_not_zero(ph & blocks.last_row_mask[b])
        - one_if_not_zero(mh & blocks.last_row_mask[b]);

    ph <<= 1;
    mh <<= 1;
    mh |= h_in_is_negative;
    ph |= (h_in > 0) as u32;

    pv = mh | !(xv | ph);
    mv = ph & xv;
    blocks.p[b] = pv;
    blocks.m[b] = mv;

    h_out
}

/// Forward pass: every end offset where the pattern matches with the
/// lowest error count seen, `start` left unset (equal to `end`).
///
/// The error threshold is lowered to the best score found so far, so a
/// later, better match discards the earlier ones.
pub fn find_match_ends(text: &[char], pattern: &[char], max_errors: usize) -> Vec<ApproximateMatch> {
    if pattern.is_empty() {
        return Vec::new();
    }
    // Clamped so `max_errors` and the last pattern row share a block.
    let mut max_errors = max_errors.min(pattern.len()) as i64;
    let w = WORD as i64;

    let b_max = pattern.len().div_ceil(WORD) - 1;
    let mut blocks = Blocks {
        p: vec![0; b_max + 1],
        m: vec![0; b_max + 1],
        last_row_mask: vec![1 << 31; b_max + 1],
    };
    blocks.last_row_mask[b_max] = 1 << ((pattern.len() - 1) % WORD);

    let peq = Peq::new(pattern, b_max + 1);

    // Index of the last active block.
    let mut y = ((max_errors + w - 1) / w - 1).max(0) as usize;

    // Score at the bottom row of each block.
    let mut score = vec![0i64; b_max + 1];
    for (b, s) in score.iter_mut().enumerate().take(y + 1) {
        *s = (b as i64 + 1) * w;
    }
    score[b_max] = pattern.len() as i64;

    for b in 0..=y {
        blocks.p[b] = !0;
        blocks.m[b] = 0;
    }

    let mut matches = Vec::new();
    for (j, &ch) in text.iter().enumerate() {
        let char_peq = peq.row(ch);

        let mut carry = 0;
        for b in 0..=y {
            carry = advance_block(&mut blocks, char_peq, b, carry);
            score[b] += carry as i64;
        }

        if score[y] - (carry as i64) <= max_errors
            && y < b_max
            && (char_peq[y + 1] & 1 != 0 || carry < 0)
        {
            // The bottom block is under the threshold: bring in the next one.
            y += 1;
            blocks.p[y] = !0;
            blocks.m[y] = 0;

            let max_block_score = if y == b_max {
                match pattern.len() % WORD {
                    0 => w,
                    remainder => remainder as i64,
                }
            } else {
                w
            };
            score[y] = score[y - 1] + max_block_score - carry as i64
                + advance_block(&mut blocks, char_peq, y, carry) as i64;
        } else {
            while y > 0 && score[y] >= max_errors + w {
                y -= 1;
            }
        }

        if y == b_max && score[y] <= max_errors {
            if score[y] < max_errors {
                matches.clear();
            }
            matches.push(ApproximateMatch {
                start: j + 1,
                end: j + 1,
                errors: score[y] as usize,
            });
            max_errors = score[y];
        }
    }

    matches
}

/// Edit distance of `pattern` against every prefix of `text`:
/// `distances[j]` is the distance to `text[..j]`.
///
/// Unlike [`find_match_ends`] the top row is not free, so every prefix is
/// aligned from `text[0]` on. All blocks stay active.
fn prefix_distances(text: &[char], pattern: &[char]) -> Vec<usize> {
    let b_max = pattern.len().div_ceil(WORD) - 1;
    let mut blocks = Blocks {
        p: vec![!0; b_max + 1],
        m: vec![0; b_max + 1],
        last_row_mask: vec![1 << 31; b_max + 1],
    };
    blocks.last_row_mask[b_max] = 1 << ((pattern.len() - 1) % WORD);
    let peq = Peq::new(pattern, b_max + 1);

    let mut score = pattern.len() as i64;
    let mut distances = Vec::with_capacity(text.len() + 1);
    distances.push(pattern.len());
    for &ch in text {
        let char_peq = peq.row(ch);
        // Each text char costs one edit at row zero.
        let mut carry = 1;
        for b in 0..=b_max {
            carry = advance_block(&mut blocks, char_peq, b, carry);
        }
        score += carry as i64;
        distances.push(score as usize);
    }
    distances
}

/// Reverse pass: fill in the start of each match found by
/// [`find_match_ends`]. The reversed pattern is aligned against the text
/// read backward from the match end, and the longest span at the lowest
/// distance wins.
fn find_match_starts(
    text: &[char],
    pattern: &[char],
    ends: Vec<ApproximateMatch>,
) -> Vec<ApproximateMatch> {
    let pattern_rev: Vec<char> = pattern.iter().rev().copied().collect();
    ends.into_iter()
        .map(|m| {
            let min_start = m.end.saturating_sub(pattern.len() + m.errors);
            let text_rev: Vec<char> = text[min_start..m.end].iter().rev().copied().collect();
            let distances = prefix_distances(&text_rev, &pattern_rev);
            let (errors, longest) = distances
                .iter()
                .enumerate()
                .map(|(len, &d)| (d, len))
                .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
                .unwrap_or((pattern.len(), 0));
            ApproximateMatch {
                start: m.end - longest,
                end: m.end,
                errors,
            }
        })
        .collect()
}

/// Find all approximate occurrences of `pattern` in `text` with at most
/// `max_errors` edits.
///
/// Only the matches with the lowest error count are returned, in text
/// order. `max_errors` is clamped to the pattern length; an empty pattern
/// has no matches.
pub fn approximate_match(text: &str, pattern: &str, max_errors: usize) -> Vec<ApproximateMatch> {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let ends = find_match_ends(&text, &pattern, max_errors);
    find_match_starts(&text, &pattern, ends)
}
