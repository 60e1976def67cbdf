//! Sliding-window alignment of page fingerprint sequences.
//!
//! Positional page-by-page comparison breaks as soon as one page is inserted
//! or removed. Instead, the shorter sequence is resampled onto every window of
//! the longer one whose length stays within the tolerated page-count skew, and
//! each window is scored by the median of its per-slot Hamming distances. The
//! median lets a minority of mismatched slots through without dragging the
//! score up.
//!
//! # Example
//!
//! ```
//! use neardupe::similarity::align_pages;
//!
//! let pages = [0x0F0F_u64, 0xF0F0, 0xFF00, 0x00FF, 0x1234];
//! let best = align_pages(&pages, &pages, 0.25).unwrap();
//! assert_eq!(best.median, 0);
//! assert_eq!(best.a_len, 5);
//! ```

use serde::{Deserialize, Serialize};

use crate::fingerprint::hamming_distance;

/// Default maximum tolerated page-count skew (fraction of the longer document).
pub const DEFAULT_MAX_SKEW: f64 = 0.25;

/// Best window found between two page sequences.
///
/// Offsets and lengths are reported in the caller's `a`/`b` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    /// Median Hamming distance over the window slots.
    pub median: u32,
    /// First page of `a` covered by the window.
    pub a_start: usize,
    /// Number of pages of `a` covered by the window.
    pub a_len: usize,
    /// First page of `b` covered by the window.
    pub b_start: usize,
    /// Number of pages of `b` covered by the window.
    pub b_len: usize,
}

/// Find the best-matching window between two ordered page sequences.
///
/// Window lengths over the longer sequence run from
/// `ceil(longer * (1 - max_skew))` up to the shorter sequence's length.
/// Returns `None` if either sequence is empty or the page counts differ by
/// more than `max_skew` allows.
#[must_use]
pub fn align_pages(a: &[u64], b: &[u64], max_skew: f64) -> Option<Alignment> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let swapped = b.len() < a.len();
    let (short, long) = if swapped { (b, a) } else { (a, b) };

    let skew = max_skew.clamp(0.0, 1.0);
    let lo = ((long.len() as f64 * (1.0 - skew)).ceil() as usize).max(1);
    let hi = short.len();
    if lo > hi {
        return None;
    }

    // (median, uncovered short pages, long start, window length)
    let mut best: Option<(u32, usize, usize, usize)> = None;
    let mut slots = Vec::with_capacity(hi);

    for window in lo..=hi {
        for start in 0..=(long.len() - window) {
            slots.clear();
            slots.extend((0..window).map(|j| {
                let resampled = j * short.len() / window;
                hamming_distance(short[resampled], long[start + j])
            }));
            slots.sort_unstable();
            let median = slots[(slots.len() - 1) / 2];

            let candidate = (median, short.len() - window, start, window);
            let better = best.map_or(true, |current| {
                (candidate.0, candidate.1, candidate.2) < (current.0, current.1, current.2)
            });
            if better {
                best = Some(candidate);
            }
        }
    }

    let (median, _, long_start, window) = best?;
    let (short_span, long_span) = ((0, short.len()), (long_start, window));
    let ((a_start, a_len), (b_start, b_len)) = if swapped {
        (long_span, short_span)
    } else {
        (short_span, long_span)
    };

    Some(Alignment {
        median,
        a_start,
        a_len,
        b_start,
        b_len,
    })
}
