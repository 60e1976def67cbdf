//! Storage boundary for the grouping pass.
//!
//! The grouping engine only talks to persistence through [`DupeStore`]. The
//! relational shape it needs is small:
//!
//! * `documents` and `page_fingerprints`, written upstream and read here
//! * `dupe_groups`, unique on `group_key`
//! * `dupe_group_members`, unique on `(group_id, document_id)`
//!
//! Both writes are single-statement upserts, so concurrent or repeated passes
//! converge on the same rows instead of duplicating them.
//!
//! [`sqlite::SqliteStore`] is the bundled implementation.

pub mod sqlite;

use std::collections::HashMap;

use crate::duplicates::models::{
    Document, DocumentId, DupeGroup, GroupId, GroupMember, MemberRecord, PageFingerprint,
};

pub use sqlite::SqliteStore;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The underlying database reported an error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Evidence could not be encoded or decoded.
    #[error("Evidence serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be interpreted.
    #[error("Invalid stored value in {column}: {message}")]
    InvalidValue {
        /// Column holding the value
        column: &'static str,
        /// What was wrong with it
        message: String,
    },
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub number: u32,
    /// Items per page
    pub size: u32,
}

impl Page {
    /// Create a page; number and size are clamped to at least 1.
    #[must_use]
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    /// Number of rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.number.max(1) - 1) * u64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 50)
    }
}

/// Persistence operations required by the grouping pass.
pub trait DupeStore {
    /// Load eligible documents, optionally restricted to one file kind,
    /// ordered by id.
    fn load_documents(&self, file_kind: Option<&str>) -> StoreResult<Vec<Document>>;

    /// Load page fingerprints for the given documents, each list ordered by
    /// page index. Documents without pages are absent from the map.
    fn load_page_fingerprints(
        &self,
        document_ids: &[DocumentId],
    ) -> StoreResult<HashMap<DocumentId, Vec<PageFingerprint>>>;

    /// Insert or update the group with `group_key`, returning its id.
    fn upsert_group(&mut self, group_key: &str, representative: DocumentId) -> StoreResult<GroupId>;

    /// Insert or update one membership row.
    ///
    /// Existing evidence from a more confident tier is kept.
    fn upsert_member(&mut self, group_id: GroupId, member: &MemberRecord) -> StoreResult<()>;

    /// List groups ordered by id.
    fn list_groups(&self, page: Page) -> StoreResult<Vec<DupeGroup>>;

    /// Members of one group ordered by document id.
    fn group_members(&self, group_id: GroupId) -> StoreResult<Vec<GroupMember>>;

    /// Total number of groups.
    fn count_groups(&self) -> StoreResult<u64>;
}
