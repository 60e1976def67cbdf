//! SimHash text fingerprints.
//!
//! Text is normalized, split into overlapping k-token shingles, and every
//! shingle votes on each of the 64 output bits with a weight equal to its
//! multiplicity. Similar texts share most shingles and end up a few bits apart.

use std::collections::BTreeMap;

use unicode_normalization::UnicodeNormalization;

/// Default number of tokens per shingle.
pub const DEFAULT_SHINGLE_SIZE: usize = 5;

/// Normalize text for fingerprinting.
///
/// Normalization includes:
/// - Unicode compatibility composition (NFKC)
/// - Converting to lowercase
/// - Collapsing all whitespace runs to a single space
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Overlapping `k`-token shingles of already-normalized text, with counts.
///
/// Text shorter than `k` tokens yields a single shingle of all its tokens.
/// A `k` of zero is treated as one.
#[must_use]
pub fn shingles(normalized: &str, k: usize) -> BTreeMap<String, u32> {
    let k = k.max(1);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let mut counts = BTreeMap::new();

    if tokens.is_empty() {
        return counts;
    }
    if tokens.len() < k {
        counts.insert(tokens.join(" "), 1);
        return counts;
    }

    for window in tokens.windows(k) {
        *counts.entry(window.join(" ")).or_insert(0) += 1;
    }
    counts
}

/// SimHash of `text` with the default shingle size.
///
/// Returns `None` when the text has no tokens.
#[must_use]
pub fn simhash_text(text: &str) -> Option<u64> {
    simhash_text_with(text, DEFAULT_SHINGLE_SIZE)
}

/// SimHash of `text` with shingles of `k` tokens.
#[must_use]
pub fn simhash_text_with(text: &str, k: usize) -> Option<u64> {
    let counts = shingles(&normalize_text(text), k);
    if counts.is_empty() {
        return None;
    }

    let mut acc = [0i64; 64];
    for (shingle, count) in &counts {
        let hash = shingle_hash(shingle);
        let weight = i64::from(*count);
        for (bit, slot) in acc.iter_mut().enumerate() {
            if (hash >> bit) & 1 == 1 {
                *slot += weight;
            } else {
                *slot -= weight;
            }
        }
    }

    Some(
        acc.iter()
            .enumerate()
            .filter(|&(_, &sum)| sum > 0)
            .fold(0u64, |out, (bit, _)| out | (1u64 << bit)),
    )
}

/// 64-bit shingle hash: the first eight bytes of BLAKE3, little endian.
fn shingle_hash(shingle: &str) -> u64 {
    let digest = blake3::hash(shingle.as_bytes());
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(word)
}
