//! Distance and alignment primitives over page fingerprint sequences.
//!
//! - [`alignment`]: sliding-window alignment of two ordered page sequences,
//!   tolerant to inserted, removed and shifted pages
//! - [`overlap`]: containment scoring of two unordered page sets for
//!   excerpts and re-paginated copies

pub mod alignment;
pub mod overlap;

pub use alignment::{align_pages, Alignment, DEFAULT_MAX_SKEW};
pub use overlap::{partial_overlap, Overlap, Relation, DEFAULT_PAGE_MATCH_THRESHOLD};
