//! Representative selection for duplicate groups.
//!
//! Each candidate is scored by a weighted sum of page count, text presence,
//! log-scaled page resolution and a capture-time factor favouring the earliest
//! capture. Ties fall through a fixed chain of attributes ending in the path,
//! so the choice never depends on iteration order.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::models::Document;

/// Weight of the page count.
pub const PAGE_COUNT_WEIGHT: f64 = 3.0;
/// Weight of having extractable text.
pub const TEXT_WEIGHT: f64 = 2.0;
/// Weight of `ln(1 + avg_page_pixels)`.
pub const RESOLUTION_WEIGHT: f64 = 1.5;
/// Weight of the capture-time factor.
pub const TIME_WEIGHT: f64 = 0.25;

/// A candidate with its computed score.
#[derive(Debug, Clone, Copy)]
pub struct RepresentativeScore<'a> {
    /// Scored document
    pub document: &'a Document,
    /// Weighted score; higher is better
    pub score: f64,
}

impl RepresentativeScore<'_> {
    /// Total order where `Less` means "better representative".
    ///
    /// Score, then page count, resolution, text presence (all descending),
    /// then capture time (earliest first, unknown last), then path and id.
    #[must_use]
    pub fn rank(&self, other: &Self) -> Ordering {
        let (a, b) = (self.document, other.document);
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| b.page_count.unwrap_or(0).cmp(&a.page_count.unwrap_or(0)))
            .then_with(|| b.avg_page_pixels.unwrap_or(0).cmp(&a.avg_page_pixels.unwrap_or(0)))
            .then_with(|| b.has_text.cmp(&a.has_text))
            .then_with(|| match (a.captured_at, b.captured_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Score every candidate.
///
/// The time factor is relative to the candidate set: 1.0 for the earliest
/// capture, 0.0 for the latest, linear in between.
#[must_use]
pub fn score_candidates<'a>(candidates: &[&'a Document]) -> Vec<RepresentativeScore<'a>> {
    let times: Vec<DateTime<Utc>> = candidates.iter().filter_map(|d| d.captured_at).collect();
    let earliest = times.iter().min().copied();
    let latest = times.iter().max().copied();

    candidates
        .iter()
        .map(|&document| {
            let time_factor = match (document.captured_at, earliest, latest) {
                (Some(t), Some(lo), Some(hi)) if hi > lo => {
                    (hi - t).num_milliseconds() as f64 / (hi - lo).num_milliseconds() as f64
                }
                (Some(_), _, _) => 1.0,
                _ => 0.0,
            };
            RepresentativeScore {
                document,
                score: base_score(document) + TIME_WEIGHT * time_factor,
            }
        })
        .collect()
}

/// Choose the best representative; `None` for an empty slice.
#[must_use]
pub fn select_representative<'a>(candidates: &[&'a Document]) -> Option<&'a Document> {
    score_candidates(candidates)
        .into_iter()
        .min_by(|a, b| a.rank(b))
        .map(|s| s.document)
}

/// Score without the set-relative time component.
fn base_score(doc: &Document) -> f64 {
    let pages = f64::from(doc.page_count.unwrap_or(0));
    let text = if doc.has_text { 1.0 } else { 0.0 };
    let resolution = (doc.avg_page_pixels.unwrap_or(0) as f64).ln_1p();
    PAGE_COUNT_WEIGHT * pages + TEXT_WEIGHT * text + RESOLUTION_WEIGHT * resolution
}
