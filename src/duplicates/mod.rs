//! Near-duplicate grouping.
//!
//! This module provides:
//! - Document and evidence models shared with the store
//! - Content identities and order-independent group keys
//! - Representative selection
//! - The tiered grouping pass (canonical, text-near, visual, partial)

pub mod grouper;
pub mod identity;
pub mod models;
pub mod representative;

pub use grouper::{
    DupeGrouper, GroupingConfig, GroupingError, GroupingPlan, GroupingSummary, PlannedGroup, TierCounts,
    DEFAULT_PARTIAL_THRESHOLD, DEFAULT_TEXT_THRESHOLD, DEFAULT_VISUAL_THRESHOLD,
};
pub use identity::{canonical_key, content_identity, group_key};
pub use models::{Document, DocumentId, DupeGroup, Evidence, GroupId, GroupMember, MemberRecord, PageFingerprint, Reason};
pub use representative::{score_candidates, select_representative, RepresentativeScore};
