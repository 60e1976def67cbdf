//! Content identity and stable group keys.
//!
//! Every document gets an identity string, even before hashing has run, and a
//! group key is a hash over the sorted identities of its members. Discovering
//! the same members in any order yields the same key, which is what makes the
//! grouping pass idempotent.

use crate::fingerprint::sha256_hex;

use super::models::Document;

/// Separator placed between sorted identities before hashing.
const KEY_SEPARATOR: &str = "\n";

/// Stable identity of a document's content.
///
/// Canonical hash if present, else the whole-file hash, else
/// `"{size}:{sha256(path)}"`.
#[must_use]
pub fn content_identity(doc: &Document) -> String {
    if let Some(key) = canonical_key(doc) {
        return key.to_string();
    }
    format!("{}:{}", doc.size_bytes, sha256_hex(doc.path.as_bytes()))
}

/// Strongest exact hash of a document: canonical hash, else whole-file hash.
#[must_use]
pub fn canonical_key(doc: &Document) -> Option<&str> {
    doc.sha256_canonical
        .as_deref()
        .or(doc.sha256.as_deref())
        .filter(|h| !h.is_empty())
}

/// Order-independent key for a prospective group.
///
/// Identities are sorted and deduplicated before hashing.
#[must_use]
pub fn group_key<I, S>(identities: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids: Vec<String> = identities.into_iter().map(|s| s.as_ref().to_string()).collect();
    ids.sort();
    ids.dedup();
    sha256_hex(ids.join(KEY_SEPARATOR).as_bytes())
}
