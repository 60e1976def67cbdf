//! Output formatters for grouping results.
//!
//! This module renders command results in two formats:
//! - Text for terminals, colored with yansi unless disabled
//! - JSON for automation and scripting
//!
//! # Example
//!
//! ```
//! use neardupe::duplicates::GroupingSummary;
//! use neardupe::error::ExitCode;
//! use neardupe::output::json::JsonSummary;
//!
//! let summary = JsonSummary::from_grouping_summary(&GroupingSummary::default(), ExitCode::NoGroups);
//! assert_eq!(summary.exit_code_name, "ND002");
//! ```

pub mod json;
pub mod text;

use serde::Serialize;

use crate::duplicates::models::{DupeGroup, GroupMember};

// Re-export main types
pub use json::{JsonFingerprint, JsonGroupPage, JsonSummary};
pub use text::TextOutput;

/// A stored group together with its members.
#[derive(Debug, Clone, Serialize)]
pub struct GroupListing {
    /// Group row
    #[serde(flatten)]
    pub group: DupeGroup,
    /// Member rows ordered by document id
    pub members: Vec<GroupMember>,
}

/// Fingerprints computed for one local file.
///
/// Fields are `None` when they do not apply (e.g. no image decoder for the
/// file, or the file is not UTF-8 text) or were not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintReport {
    /// File that was fingerprinted
    pub path: String,
    /// SHA-256 of the raw bytes
    pub sha256: Option<String>,
    /// SHA-256 of the decoded pixels
    pub canonical: Option<String>,
    /// 64-bit perceptual hash
    pub phash: Option<u64>,
    /// 64-bit text SimHash
    pub simhash: Option<u64>,
}
