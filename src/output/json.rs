//! JSON output formatter.
//!
//! # Output Schema
//!
//! `neardupe group --output json`:
//!
//! ```json
//! {
//!   "documents": 120,
//!   "pairs_compared": { "canonical": 2, "text_near": 40, "visual": 300, "partial": 290 },
//!   "matches": { "canonical": 2, "text_near": 3, "visual": 5, "partial": 1 },
//!   "groups_written": 4,
//!   "members_written": 11,
//!   "duration_ms": 87,
//!   "exit_code": 0,
//!   "exit_code_name": "ND000"
//! }
//! ```
//!
//! `neardupe groups --output json` wraps one page of [`GroupListing`]s in a
//! [`JsonGroupPage`]; member evidence is tagged by `reason`.

use std::io::Write;

use serde::Serialize;

use super::{FingerprintReport, GroupListing};
use crate::duplicates::{GroupingSummary, TierCounts};
use crate::error::ExitCode;
use crate::store::Page;

/// Per-tier counters in JSON format.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct JsonTierCounts {
    /// Canonical tier
    pub canonical: usize,
    /// Text-near tier
    pub text_near: usize,
    /// Visual tier
    pub visual: usize,
    /// Partial tier
    pub partial: usize,
}

impl From<TierCounts> for JsonTierCounts {
    fn from(counts: TierCounts) -> Self {
        Self {
            canonical: counts.canonical,
            text_near: counts.text_near,
            visual: counts.visual,
            partial: counts.partial,
        }
    }
}

/// Pass summary in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Eligible documents
    pub documents: usize,
    /// Pairs scored per tier
    pub pairs_compared: JsonTierCounts,
    /// Pairs matched per tier
    pub matches: JsonTierCounts,
    /// Groups upserted
    pub groups_written: usize,
    /// Membership rows upserted
    pub members_written: usize,
    /// Duration of the pass in milliseconds
    pub duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "ND000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a pass summary and an exit code.
    #[must_use]
    pub fn from_grouping_summary(summary: &GroupingSummary, exit_code: ExitCode) -> Self {
        Self {
            documents: summary.documents,
            pairs_compared: summary.pairs_compared.into(),
            matches: summary.matches.into(),
            groups_written: summary.groups_written,
            members_written: summary.members_written,
            duration_ms: summary.duration.as_millis() as u64,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// One page of stored groups.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroupPage {
    /// 1-based page number
    pub page: u32,
    /// Groups per page
    pub page_size: u32,
    /// Total groups in the store
    pub total_groups: u64,
    /// Groups on this page
    pub groups: Vec<GroupListing>,
}

impl JsonGroupPage {
    /// Wrap listings with their pagination metadata.
    #[must_use]
    pub fn new(page: Page, total_groups: u64, groups: Vec<GroupListing>) -> Self {
        Self {
            page: page.number,
            page_size: page.size,
            total_groups,
            groups,
        }
    }
}

/// Fingerprints of one file; 64-bit values are rendered as 16 hex digits.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFingerprint {
    /// File path
    pub path: String,
    /// SHA-256 of the raw bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// SHA-256 of the decoded pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    /// Perceptual hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phash: Option<String>,
    /// Text SimHash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simhash: Option<String>,
}

impl From<&FingerprintReport> for JsonFingerprint {
    fn from(report: &FingerprintReport) -> Self {
        Self {
            path: report.path.clone(),
            sha256: report.sha256.clone(),
            canonical: report.canonical.clone(),
            phash: report.phash.map(|v| format!("{v:016x}")),
            simhash: report.simhash.map(|v| format!("{v:016x}")),
        }
    }
}

/// Serialize `value` as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_pretty<W: Write, T: Serialize>(writer: &mut W, value: &T) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::models::{DupeGroup, Evidence, GroupMember, Reason};
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_summary_fields() {
        let summary = GroupingSummary {
            documents: 10,
            groups_written: 2,
            members_written: 5,
            duration: Duration::from_millis(1500),
            ..GroupingSummary::default()
        };
        let json = JsonSummary::from_grouping_summary(&summary, ExitCode::Success);
        assert_eq!(json.duration_ms, 1500);
        assert_eq!(json.exit_code_name, "ND000");

        let value = serde_json::to_value(&json).unwrap();
        assert_eq!(value["groups_written"], 2);
        assert_eq!(value["matches"]["text_near"], 0);
    }

    #[test]
    fn test_group_page_embeds_evidence() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let listing = GroupListing {
            group: DupeGroup {
                id: 7,
                group_key: "abc".to_string(),
                representative_document_id: 1,
                created_at: at,
                updated_at: at,
            },
            members: vec![GroupMember {
                group_id: 7,
                document_id: 2,
                distance: 3,
                reason: Reason::TextNear,
                evidence: Evidence::TextNear { distance: 3 },
            }],
        };
        let page = JsonGroupPage::new(Page::new(1, 10), 1, vec![listing]);
        let value = serde_json::to_value(&page).unwrap();

        assert_eq!(value["total_groups"], 1);
        assert_eq!(value["groups"][0]["id"], 7);
        assert_eq!(value["groups"][0]["members"][0]["reason"], "text-near");
        assert_eq!(value["groups"][0]["members"][0]["evidence"]["distance"], 3);
    }

    #[test]
    fn test_fingerprint_hex_and_omitted_fields() {
        let report = FingerprintReport {
            path: "a.txt".to_string(),
            simhash: Some(0xff),
            ..FingerprintReport::default()
        };
        let value = serde_json::to_value(JsonFingerprint::from(&report)).unwrap();
        assert_eq!(value["simhash"], "00000000000000ff");
        assert!(value.get("phash").is_none());
    }

    #[test]
    fn test_write_pretty_ends_with_newline() {
        let mut buf = Vec::new();
        write_pretty(&mut buf, &serde_json::json!({"a": 1})).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains('\n'));
    }
}
