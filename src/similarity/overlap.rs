//! Partial-overlap scoring between two unordered page fingerprint sets.
//!
//! Each page of the smaller set is paired one-to-one with the closest unused
//! page of the larger set, provided they are within `page_threshold` bits.
//! The containment ratio (matched pages over the smaller set) detects excerpts
//! and re-paginated copies that the ordered alignment rejects.

use serde::{Deserialize, Serialize};

use crate::fingerprint::hamming_distance;

/// Default per-page Hamming distance for two pages to count as the same page.
pub const DEFAULT_PAGE_MATCH_THRESHOLD: u32 = 8;

/// How the first document relates to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Every page of each document is present in the other.
    Equal,
    /// Every page of the first (smaller) document is present in the second.
    Subset,
    /// Every page of the second (smaller) document is present in the first.
    Superset,
    /// Some, but not all, pages of the smaller document are shared.
    Overlap,
    /// No pages are shared.
    Disjoint,
}

impl Relation {
    /// Lowercase tag used in evidence and output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Subset => "subset",
            Self::Superset => "superset",
            Self::Overlap => "overlap",
            Self::Disjoint => "disjoint",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of partial-overlap scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overlap {
    /// Matched pages over the size of the smaller set, in `[0, 1]`.
    pub containment: f64,
    /// Matched pages over the size of the union, in `[0, 1]`.
    pub jaccard: f64,
    /// Number of one-to-one page matches.
    pub matched_pages: usize,
    /// Relation of the first set to the second.
    pub relation: Relation,
}

/// Score how much of one page set is contained in the other.
///
/// Returns `None` if either set is empty, so degenerate inputs never produce
/// a spurious perfect score.
#[must_use]
pub fn partial_overlap(a: &[u64], b: &[u64], page_threshold: u32) -> Option<Overlap> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    // Candidate page pairs, closest first; ties resolved by position.
    let mut candidates: Vec<(u32, usize, usize)> = small
        .iter()
        .enumerate()
        .flat_map(|(i, &s)| {
            large.iter().enumerate().filter_map(move |(j, &l)| {
                let d = hamming_distance(s, l);
                (d <= page_threshold).then_some((d, i, j))
            })
        })
        .collect();
    candidates.sort_unstable();

    let mut small_used = vec![false; small.len()];
    let mut large_used = vec![false; large.len()];
    let mut matched = 0usize;
    for (_, i, j) in candidates {
        if !small_used[i] && !large_used[j] {
            small_used[i] = true;
            large_used[j] = true;
            matched += 1;
        }
    }

    let containment = matched as f64 / small.len() as f64;
    let jaccard = matched as f64 / (a.len() + b.len() - matched) as f64;

    let relation = if matched == 0 {
        Relation::Disjoint
    } else if matched < small.len() {
        Relation::Overlap
    } else if a.len() == b.len() {
        Relation::Equal
    } else if a.len() < b.len() {
        Relation::Subset
    } else {
        Relation::Superset
    };

    Some(Overlap {
        containment,
        jaccard,
        matched_pages: matched,
        relation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(n: usize) -> Vec<u64> {
        (0..n as u64)
            .map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(17) ^ 0xA5A5_5A5A_0F0F_F0F0)
            .collect()
    }

    #[test]
    fn test_empty_sets_are_skipped() {
        assert!(partial_overlap(&[], &[1], DEFAULT_PAGE_MATCH_THRESHOLD).is_none());
        assert!(partial_overlap(&[1], &[], DEFAULT_PAGE_MATCH_THRESHOLD).is_none());
    }

    #[test]
    fn test_first_half_is_subset() {
        let full = pages(10);
        let half = &full[..5];

        let overlap = partial_overlap(half, &full, DEFAULT_PAGE_MATCH_THRESHOLD).unwrap();
        assert_eq!(overlap.matched_pages, 5);
        assert!((overlap.containment - 1.0).abs() < f64::EPSILON);
        assert!((overlap.jaccard - 0.5).abs() < f64::EPSILON);
        assert_eq!(overlap.relation, Relation::Subset);

        let reverse = partial_overlap(&full, half, DEFAULT_PAGE_MATCH_THRESHOLD).unwrap();
        assert_eq!(reverse.relation, Relation::Superset);
    }

    #[test]
    fn test_reordered_pages_are_equal() {
        let p = pages(4);
        let shuffled = vec![p[2], p[0], p[3], p[1]];
        let overlap = partial_overlap(&p, &shuffled, DEFAULT_PAGE_MATCH_THRESHOLD).unwrap();
        assert_eq!(overlap.relation, Relation::Equal);
        assert_eq!(overlap.matched_pages, 4);
    }

    #[test]
    fn test_matching_is_one_to_one() {
        // One page repeated cannot claim several pages of the other side
        let p = pages(3);
        let repeated = vec![p[0], p[0], p[0]];
        let overlap = partial_overlap(&repeated, &p, DEFAULT_PAGE_MATCH_THRESHOLD).unwrap();
        assert_eq!(overlap.matched_pages, 1);
        assert_eq!(overlap.relation, Relation::Overlap);
    }

    #[test]
    fn test_disjoint() {
        let overlap = partial_overlap(&[0], &[u64::MAX], DEFAULT_PAGE_MATCH_THRESHOLD).unwrap();
        assert_eq!(overlap.relation, Relation::Disjoint);
        assert_eq!(overlap.containment, 0.0);
    }

    #[test]
    fn test_relation_display() {
        assert_eq!(Relation::Subset.to_string(), "subset");
        assert_eq!(serde_json::to_string(&Relation::Superset).unwrap(), "\"superset\"");
    }
}
