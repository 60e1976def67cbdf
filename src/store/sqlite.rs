//! SQLite-backed grouping store.
//!
//! # Fingerprint encoding
//!
//! SQLite integers are signed 64-bit, so `u64` fingerprints are stored
//! bit-cast to `i64` and cast back on read.
//!
//! # Upserts
//!
//! Groups upsert on `group_key` and return their id via `RETURNING`. Members
//! upsert on `(group_id, document_id)` and only replace a row when the incoming
//! `reason_rank` is at least as confident as the stored one.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{DupeStore, Page, StoreError, StoreResult};
use crate::duplicates::models::{
    Document, DocumentId, DupeGroup, Evidence, GroupId, GroupMember, MemberRecord, PageFingerprint, Reason,
};

/// Current schema version stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id                INTEGER PRIMARY KEY,
    path              TEXT    NOT NULL,
    size_bytes        INTEGER NOT NULL,
    file_kind         TEXT    NOT NULL,
    sha256            TEXT,
    sha256_canonical  TEXT,
    page_count        INTEGER,
    has_text          INTEGER NOT NULL DEFAULT 0,
    text_fingerprint  INTEGER,
    avg_page_pixels   INTEGER,
    captured_at       TEXT
);
CREATE INDEX IF NOT EXISTS idx_documents_file_kind ON documents(file_kind);

CREATE TABLE IF NOT EXISTS page_fingerprints (
    document_id  INTEGER NOT NULL REFERENCES documents(id),
    page_index   INTEGER NOT NULL,
    fingerprint  INTEGER NOT NULL,
    PRIMARY KEY (document_id, page_index)
);

CREATE TABLE IF NOT EXISTS dupe_groups (
    id                          INTEGER PRIMARY KEY AUTOINCREMENT,
    group_key                   TEXT    NOT NULL UNIQUE,
    representative_document_id  INTEGER NOT NULL REFERENCES documents(id),
    created_at                  TEXT    NOT NULL,
    updated_at                  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS dupe_group_members (
    group_id     INTEGER NOT NULL REFERENCES dupe_groups(id),
    document_id  INTEGER NOT NULL REFERENCES documents(id),
    distance     INTEGER NOT NULL,
    reason       TEXT    NOT NULL,
    reason_rank  INTEGER NOT NULL,
    evidence     TEXT    NOT NULL,
    PRIMARY KEY (group_id, document_id)
);
CREATE INDEX IF NOT EXISTS idx_members_document ON dupe_group_members(document_id);
";

const DOCUMENT_COLUMNS: &str = "id, path, size_bytes, file_kind, sha256, sha256_canonical, page_count, \
     has_text, text_fingerprint, avg_page_pixels, captured_at";

/// Grouping store on a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema fails.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Could not create database directory {}: {}", parent.display(), e);
            }
        }
        let conn = Connection::open(path)?;
        log::debug!("Opened grouping store at {}", path.display());
        Self::from_connection(conn)
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(Self { conn })
    }

    /// Insert or refresh an upstream document row.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn insert_document(&self, doc: &Document) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO documents (id, path, size_bytes, file_kind, sha256, sha256_canonical, page_count,
                                    has_text, text_fingerprint, avg_page_pixels, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                size_bytes = excluded.size_bytes,
                file_kind = excluded.file_kind,
                sha256 = excluded.sha256,
                sha256_canonical = excluded.sha256_canonical,
                page_count = excluded.page_count,
                has_text = excluded.has_text,
                text_fingerprint = excluded.text_fingerprint,
                avg_page_pixels = excluded.avg_page_pixels,
                captured_at = excluded.captured_at",
            params![
                doc.id,
                doc.path,
                (doc.size_bytes as i64),
                doc.file_kind,
                doc.sha256,
                doc.sha256_canonical,
                doc.page_count,
                doc.has_text,
                doc.text_fingerprint.map(|f| f as i64),
                doc.avg_page_pixels.map(|p| p as i64),
                doc.captured_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Replace the page fingerprints of one document.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction is rolled back.
    pub fn insert_page_fingerprints(&mut self, document_id: DocumentId, fingerprints: &[u64]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM page_fingerprints WHERE document_id = ?1",
            params![document_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO page_fingerprints (document_id, page_index, fingerprint) VALUES (?1, ?2, ?3)",
            )?;
            for (index, fingerprint) in fingerprints.iter().enumerate() {
                stmt.execute(params![document_id, (index as i64), (*fingerprint as i64)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Total number of membership rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_members(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dupe_group_members", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Look up a group by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored timestamp is invalid.
    pub fn find_group_by_key(&self, group_key: &str) -> StoreResult<Option<DupeGroup>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, group_key, representative_document_id, created_at, updated_at
                 FROM dupe_groups WHERE group_key = ?1",
                params![group_key],
                raw_group,
            )
            .optional()?;
        raw.map(RawGroup::into_group).transpose()
    }
}

impl DupeStore for SqliteStore {
    fn load_documents(&self, file_kind: Option<&str>) -> StoreResult<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE (?1 IS NULL OR file_kind = ?1) ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![file_kind], |row| {
                Ok(RawDocument {
                    document: Document {
                        id: row.get(0)?,
                        path: row.get(1)?,
                        size_bytes: row.get::<_, i64>(2)? as u64,
                        file_kind: row.get(3)?,
                        sha256: row.get(4)?,
                        sha256_canonical: row.get(5)?,
                        page_count: row.get(6)?,
                        has_text: row.get(7)?,
                        text_fingerprint: row.get::<_, Option<i64>>(8)?.map(|f| f as u64),
                        avg_page_pixels: row.get::<_, Option<i64>>(9)?.map(|p| p as u64),
                        captured_at: None,
                    },
                    captured_at: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|r| {
                let mut document = r.document;
                document.captured_at = r.captured_at.as_deref().map(|s| parse_time("captured_at", s)).transpose()?;
                Ok(document)
            })
            .collect()
    }

    fn load_page_fingerprints(
        &self,
        document_ids: &[DocumentId],
    ) -> StoreResult<HashMap<DocumentId, Vec<PageFingerprint>>> {
        let mut stmt = self.conn.prepare(
            "SELECT document_id, page_index, fingerprint FROM page_fingerprints
             WHERE document_id = ?1 ORDER BY page_index",
        )?;

        let mut pages = HashMap::new();
        for &id in document_ids {
            let rows = stmt
                .query_map(params![id], |row| {
                    Ok(PageFingerprint {
                        document_id: row.get(0)?,
                        page_index: row.get(1)?,
                        fingerprint: row.get::<_, i64>(2)? as u64,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            if !rows.is_empty() {
                pages.insert(id, rows);
            }
        }
        Ok(pages)
    }

    fn upsert_group(&mut self, group_key: &str, representative: DocumentId) -> StoreResult<GroupId> {
        let now = Utc::now().to_rfc3339();
        let id = self.conn.query_row(
            "INSERT INTO dupe_groups (group_key, representative_document_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(group_key) DO UPDATE SET
                representative_document_id = excluded.representative_document_id,
                updated_at = excluded.updated_at
             RETURNING id",
            params![group_key, representative, now],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn upsert_member(&mut self, group_id: GroupId, member: &MemberRecord) -> StoreResult<()> {
        let evidence = serde_json::to_string(&member.evidence)?;
        let reason = member.reason();
        self.conn.execute(
            "INSERT INTO dupe_group_members (group_id, document_id, distance, reason, reason_rank, evidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(group_id, document_id) DO UPDATE SET
                distance = excluded.distance,
                reason = excluded.reason,
                reason_rank = excluded.reason_rank,
                evidence = excluded.evidence
             WHERE excluded.reason_rank <= dupe_group_members.reason_rank",
            params![
                group_id,
                member.document_id,
                member.distance(),
                reason.as_str(),
                reason.rank(),
                evidence,
            ],
        )?;
        Ok(())
    }

    fn list_groups(&self, page: Page) -> StoreResult<Vec<DupeGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, group_key, representative_document_id, created_at, updated_at
             FROM dupe_groups ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;
        let raw = stmt
            .query_map(params![page.size, (page.offset() as i64)], raw_group)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawGroup::into_group).collect()
    }

    fn group_members(&self, group_id: GroupId) -> StoreResult<Vec<GroupMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT document_id, distance, reason, evidence FROM dupe_group_members
             WHERE group_id = ?1 ORDER BY document_id",
        )?;
        let raw = stmt
            .query_map(params![group_id], |row| {
                Ok((
                    row.get::<_, DocumentId>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(document_id, distance, reason, evidence)| {
                let reason: Reason = reason
                    .parse()
                    .map_err(|message| StoreError::InvalidValue { column: "reason", message })?;
                let evidence: Evidence = serde_json::from_str(&evidence)?;
                Ok(GroupMember {
                    group_id,
                    document_id,
                    distance,
                    reason,
                    evidence,
                })
            })
            .collect()
    }

    fn count_groups(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dupe_groups", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

struct RawDocument {
    document: Document,
    captured_at: Option<String>,
}

struct RawGroup {
    id: GroupId,
    group_key: String,
    representative_document_id: DocumentId,
    created_at: String,
    updated_at: String,
}

impl RawGroup {
    fn into_group(self) -> StoreResult<DupeGroup> {
        Ok(DupeGroup {
            id: self.id,
            group_key: self.group_key,
            representative_document_id: self.representative_document_id,
            created_at: parse_time("created_at", &self.created_at)?,
            updated_at: parse_time("updated_at", &self.updated_at)?,
        })
    }
}

fn raw_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawGroup> {
    Ok(RawGroup {
        id: row.get(0)?,
        group_key: row.get(1)?,
        representative_document_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn parse_time(column: &'static str, value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidValue {
            column,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::Relation;
    use chrono::TimeZone;

    fn store_with_docs(n: i64) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for id in 1..=n {
            store
                .insert_document(&Document::new(id, format!("/docs/{id}.pdf"), 100 * id as u64, "pdf"))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_document_round_trip_keeps_high_bit_fingerprints() {
        let store = SqliteStore::open_in_memory().unwrap();
        let captured = Utc.with_ymd_and_hms(2023, 3, 4, 5, 6, 7).unwrap();
        let doc = Document::new(1, "/a.pdf", 42, "pdf")
            .with_sha256("aa")
            .with_canonical("cc")
            .with_page_count(3)
            .with_text_fingerprint(u64::MAX - 1)
            .with_avg_page_pixels(1_920_000)
            .with_captured_at(captured);
        store.insert_document(&doc).unwrap();

        let loaded = store.load_documents(None).unwrap();
        assert_eq!(loaded, vec![doc]);
    }

    #[test]
    fn test_load_documents_filters_kind() {
        let store = store_with_docs(2);
        store.insert_document(&Document::new(3, "/img.png", 5, "image")).unwrap();

        let pdfs = store.load_documents(Some("pdf")).unwrap();
        assert_eq!(pdfs.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.load_documents(None).unwrap().len(), 3);
    }

    #[test]
    fn test_page_fingerprints_ordered_and_replaced() {
        let mut store = store_with_docs(2);
        store.insert_page_fingerprints(1, &[u64::MAX, 1, 2]).unwrap();
        store.insert_page_fingerprints(1, &[9, 8]).unwrap();

        let pages = store.load_page_fingerprints(&[1, 2]).unwrap();
        let prints: Vec<u64> = pages[&1].iter().map(|p| p.fingerprint).collect();
        assert_eq!(prints, vec![9, 8]);
        assert!(!pages.contains_key(&2));
    }

    #[test]
    fn test_upsert_group_is_keyed() {
        let mut store = store_with_docs(2);
        let first = store.upsert_group("key-1", 1).unwrap();
        let again = store.upsert_group("key-1", 2).unwrap();
        assert_eq!(first, again);
        assert_eq!(store.count_groups().unwrap(), 1);

        let group = store.find_group_by_key("key-1").unwrap().unwrap();
        assert_eq!(group.representative_document_id, 2);
        assert!(store.find_group_by_key("missing").unwrap().is_none());
    }

    #[test]
    fn test_member_upsert_keeps_more_confident_evidence() {
        let mut store = store_with_docs(2);
        let group = store.upsert_group("key", 1).unwrap();

        store
            .upsert_member(group, &MemberRecord { document_id: 2, evidence: Evidence::TextNear { distance: 3 } })
            .unwrap();
        store
            .upsert_member(
                group,
                &MemberRecord {
                    document_id: 2,
                    evidence: Evidence::Partial {
                        ratio: 0.8,
                        jaccard: 0.5,
                        relation: Relation::Overlap,
                        matched_pages: 4,
                    },
                },
            )
            .unwrap();

        let members = store.group_members(group).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].reason, Reason::TextNear);
        assert_eq!(members[0].distance, 3);

        store
            .upsert_member(group, &MemberRecord { document_id: 2, evidence: Evidence::Canonical })
            .unwrap();
        let members = store.group_members(group).unwrap();
        assert_eq!(members[0].reason, Reason::Canonical);
        assert_eq!(members[0].evidence, Evidence::Canonical);
        assert_eq!(store.count_members().unwrap(), 1);
    }

    #[test]
    fn test_list_groups_paginates() {
        let mut store = store_with_docs(1);
        for i in 0..5 {
            store.upsert_group(&format!("k{i}"), 1).unwrap();
        }
        let first = store.list_groups(Page::new(1, 2)).unwrap();
        let last = store.list_groups(Page::new(3, 2)).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].group_key, "k4");
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("groups.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_document(&Document::new(1, "/a", 1, "pdf")).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load_documents(None).unwrap().len(), 1);
    }
}
