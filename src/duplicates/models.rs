//! Read and write models exchanged with the store.
//!
//! Documents and page fingerprints are produced upstream and only read here.
//! Groups and memberships are written exclusively by the grouping pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::similarity::{Alignment, Relation};

/// Identifier of a stored document.
pub type DocumentId = i64;

/// Identifier of a stored duplicate group.
pub type GroupId = i64;

/// One physical file under consideration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store identifier
    pub id: DocumentId,
    /// Storage path
    pub path: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// File kind, e.g. "pdf" or "image"
    pub file_kind: String,
    /// SHA-256 of the raw bytes (hex), once hashed
    pub sha256: Option<String>,
    /// Normalized content hash ignoring non-semantic byte differences
    pub sha256_canonical: Option<String>,
    /// Number of pages (documents only)
    pub page_count: Option<u32>,
    /// Whether extractable text exists
    pub has_text: bool,
    /// SimHash of the whole document's text
    pub text_fingerprint: Option<u64>,
    /// Mean width × height of the rendered pages
    pub avg_page_pixels: Option<u64>,
    /// Capture or creation time from file metadata
    pub captured_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a document with only the mandatory attributes set.
    #[must_use]
    pub fn new(id: DocumentId, path: impl Into<String>, size_bytes: u64, file_kind: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            size_bytes,
            file_kind: file_kind.into(),
            sha256: None,
            sha256_canonical: None,
            page_count: None,
            has_text: false,
            text_fingerprint: None,
            avg_page_pixels: None,
            captured_at: None,
        }
    }

    /// Set the whole-file hash.
    #[must_use]
    pub fn with_sha256(mut self, hash: impl Into<String>) -> Self {
        self.sha256 = Some(hash.into());
        self
    }

    /// Set the canonical content hash.
    #[must_use]
    pub fn with_canonical(mut self, hash: impl Into<String>) -> Self {
        self.sha256_canonical = Some(hash.into());
        self
    }

    /// Set the page count.
    #[must_use]
    pub fn with_page_count(mut self, pages: u32) -> Self {
        self.page_count = Some(pages);
        self
    }

    /// Set the text fingerprint; also marks the document as having text.
    #[must_use]
    pub fn with_text_fingerprint(mut self, fingerprint: u64) -> Self {
        self.text_fingerprint = Some(fingerprint);
        self.has_text = true;
        self
    }

    /// Set whether extractable text exists.
    #[must_use]
    pub fn with_has_text(mut self, has_text: bool) -> Self {
        self.has_text = has_text;
        self
    }

    /// Set the mean page resolution in pixels.
    #[must_use]
    pub fn with_avg_page_pixels(mut self, pixels: u64) -> Self {
        self.avg_page_pixels = Some(pixels);
        self
    }

    /// Set the capture time.
    #[must_use]
    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = Some(at);
        self
    }
}

/// Perceptual fingerprint of one page of a multi-page document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFingerprint {
    /// Owning document
    pub document_id: DocumentId,
    /// Zero-based page index
    pub page_index: u32,
    /// 64-bit perceptual fingerprint
    pub fingerprint: u64,
}

/// Detection tier that justified a membership, in decreasing confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    /// Identical canonical (or whole-file) hash.
    Canonical,
    /// Text fingerprints within the text threshold.
    TextNear,
    /// Page sequences aligned within the visual threshold.
    Visual,
    /// Page sets overlap above the partial threshold.
    Partial,
}

impl Reason {
    /// Confidence rank; lower is more confident.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Canonical => 0,
            Self::TextNear => 1,
            Self::Visual => 2,
            Self::Partial => 3,
        }
    }

    /// Tag stored in the `reason` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Canonical => "canonical",
            Self::TextNear => "text-near",
            Self::Visual => "visual",
            Self::Partial => "partial",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canonical" => Ok(Self::Canonical),
            "text-near" => Ok(Self::TextNear),
            "visual" => Ok(Self::Visual),
            "partial" => Ok(Self::Partial),
            other => Err(format!("unknown match reason: {other}")),
        }
    }
}

/// Tier-specific evidence attached to a membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Evidence {
    /// Same canonical content hash.
    Canonical,
    /// Hamming distance between text fingerprints.
    TextNear {
        /// Bits that differ
        distance: u32,
    },
    /// Best sliding-window alignment of the page sequences.
    Visual {
        /// Median per-page distance of the winning window
        distance: u32,
        /// Winning window
        alignment: Alignment,
    },
    /// Page-set containment.
    Partial {
        /// Containment ratio compared against the partial threshold
        ratio: f64,
        /// Matched pages over the union of both page sets
        jaccard: f64,
        /// Relation of the lower-id document to the other
        relation: Relation,
        /// One-to-one page matches
        matched_pages: usize,
    },
}

/// Scale of the synthetic distance derived from a partial-overlap ratio.
const PARTIAL_DISTANCE_SCALE: f64 = 16.0;

impl Evidence {
    /// Tier that produced this evidence.
    #[must_use]
    pub fn reason(&self) -> Reason {
        match self {
            Self::Canonical => Reason::Canonical,
            Self::TextNear { .. } => Reason::TextNear,
            Self::Visual { .. } => Reason::Visual,
            Self::Partial { .. } => Reason::Partial,
        }
    }

    /// Uniform integer distance stored alongside the evidence.
    ///
    /// Partial matches map their ratio to `round((1 - ratio) * 16)`.
    #[must_use]
    pub fn distance(&self) -> u32 {
        match self {
            Self::Canonical => 0,
            Self::TextNear { distance } | Self::Visual { distance, .. } => *distance,
            Self::Partial { ratio, .. } => ((1.0 - ratio.clamp(0.0, 1.0)) * PARTIAL_DISTANCE_SCALE).round() as u32,
        }
    }
}

/// Membership row to upsert for one document of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    /// Member document
    pub document_id: DocumentId,
    /// Evidence of the most confident match that attached the document
    pub evidence: Evidence,
}

impl MemberRecord {
    /// Tier that matched this member.
    #[must_use]
    pub fn reason(&self) -> Reason {
        self.evidence.reason()
    }

    /// Stored distance for this member.
    #[must_use]
    pub fn distance(&self) -> u32 {
        self.evidence.distance()
    }
}

/// A persisted duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DupeGroup {
    /// Store identifier
    pub id: GroupId,
    /// Order-independent key derived from member identities
    pub group_key: String,
    /// Chosen representative
    pub representative_document_id: DocumentId,
    /// First time the group was written
    pub created_at: DateTime<Utc>,
    /// Last time the group was written
    pub updated_at: DateTime<Utc>,
}

/// A persisted membership row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMember {
    /// Owning group
    pub group_id: GroupId,
    /// Member document
    pub document_id: DocumentId,
    /// Distance that justified inclusion
    pub distance: u32,
    /// Matching tier
    pub reason: Reason,
    /// Tier-specific evidence
    pub evidence: Evidence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trip_tags() {
        for reason in [Reason::Canonical, Reason::TextNear, Reason::Visual, Reason::Partial] {
            assert_eq!(reason.as_str().parse::<Reason>().unwrap(), reason);
        }
        assert!("fuzzy".parse::<Reason>().is_err());
    }

    #[test]
    fn test_reason_rank_follows_tier_order() {
        assert!(Reason::Canonical.rank() < Reason::TextNear.rank());
        assert!(Reason::TextNear.rank() < Reason::Visual.rank());
        assert!(Reason::Visual.rank() < Reason::Partial.rank());
    }

    #[test]
    fn test_evidence_is_tagged_by_reason() {
        let json = serde_json::to_value(Evidence::TextNear { distance: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"reason": "text-near", "distance": 4}));

        let json = serde_json::to_value(Evidence::Canonical).unwrap();
        assert_eq!(json, serde_json::json!({"reason": "canonical"}));
    }

    #[test]
    fn test_partial_distance_is_scaled_ratio() {
        let evidence = |ratio| Evidence::Partial {
            ratio,
            jaccard: 0.5,
            relation: Relation::Subset,
            matched_pages: 5,
        };
        assert_eq!(evidence(1.0).distance(), 0);
        assert_eq!(evidence(0.7).distance(), 5);
        assert_eq!(evidence(0.95).distance(), 1);
        assert_eq!(evidence(0.0).distance(), 16);
    }

    #[test]
    fn test_document_builder() {
        let doc = Document::new(7, "/a.pdf", 10, "pdf")
            .with_sha256("abc")
            .with_page_count(3)
            .with_text_fingerprint(42);
        assert_eq!(doc.sha256.as_deref(), Some("abc"));
        assert_eq!(doc.page_count, Some(3));
        assert!(doc.has_text);
        assert!(doc.sha256_canonical.is_none());
    }
}
