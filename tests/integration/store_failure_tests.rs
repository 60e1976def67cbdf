use neardupe::duplicates::models::{DupeGroup, GroupMember};
use neardupe::duplicates::{Document, DocumentId, DupeGrouper, GroupId, GroupingError, MemberRecord, PageFingerprint};
use neardupe::store::{DupeStore, Page, SqliteStore, StoreError, StoreResult};
use std::collections::HashMap;

/// Delegates to SQLite but fails after a fixed number of member writes.
struct FlakyStore {
    inner: SqliteStore,
    member_writes_left: usize,
}

impl DupeStore for FlakyStore {
    fn load_documents(&self, file_kind: Option<&str>) -> StoreResult<Vec<Document>> {
        self.inner.load_documents(file_kind)
    }

    fn load_page_fingerprints(
        &self,
        document_ids: &[DocumentId],
    ) -> StoreResult<HashMap<DocumentId, Vec<PageFingerprint>>> {
        self.inner.load_page_fingerprints(document_ids)
    }

    fn upsert_group(&mut self, group_key: &str, representative: DocumentId) -> StoreResult<GroupId> {
        self.inner.upsert_group(group_key, representative)
    }

    fn upsert_member(&mut self, group_id: GroupId, member: &MemberRecord) -> StoreResult<()> {
        if self.member_writes_left == 0 {
            return Err(StoreError::InvalidValue {
                column: "dupe_group_members",
                message: "disk full".to_string(),
            });
        }
        self.member_writes_left -= 1;
        self.inner.upsert_member(group_id, member)
    }

    fn list_groups(&self, page: Page) -> StoreResult<Vec<DupeGroup>> {
        self.inner.list_groups(page)
    }

    fn group_members(&self, group_id: GroupId) -> StoreResult<Vec<GroupMember>> {
        self.inner.group_members(group_id)
    }

    fn count_groups(&self) -> StoreResult<u64> {
        self.inner.count_groups()
    }
}

fn seeded(member_writes_left: usize) -> FlakyStore {
    let inner = SqliteStore::open_in_memory().unwrap();
    for id in 1..=3 {
        let doc = Document::new(id, format!("/d/{id}"), 1, "pdf").with_canonical("same");
        inner.insert_document(&doc).unwrap();
    }
    FlakyStore {
        inner,
        member_writes_left,
    }
}

#[test]
fn test_store_failure_aborts_pass() {
    let mut store = seeded(1);
    let err = DupeGrouper::with_defaults().run(&mut store).unwrap_err();
    assert!(matches!(err, GroupingError::Store(_)));

    // The write that succeeded stays committed
    assert_eq!(store.count_groups().unwrap(), 1);
    assert_eq!(store.inner.count_members().unwrap(), 1);
}

#[test]
fn test_rerun_after_failure_completes_group() {
    let mut store = seeded(1);
    assert!(DupeGrouper::with_defaults().run(&mut store).is_err());

    store.member_writes_left = usize::MAX;
    let summary = DupeGrouper::with_defaults().run(&mut store).unwrap();
    assert_eq!(summary.groups_written, 1);
    assert_eq!(store.count_groups().unwrap(), 1);
    assert_eq!(store.inner.count_members().unwrap(), 3);
}
