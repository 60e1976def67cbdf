//! Grouping orchestrator with four detection tiers.
//!
//! # Overview
//!
//! A grouping pass reads eligible documents and their page fingerprints from a
//! [`DupeStore`], matches pairs in decreasing order of confidence and writes
//! the resulting clusters back:
//!
//! 1. **Canonical** - shared canonical or whole-file hash, distance 0
//! 2. **Text-near** - SimHash distance within the text threshold
//! 3. **Visual** - sliding-window page alignment within the visual threshold
//! 4. **Partial** - page-set containment above the partial threshold, for
//!    pairs the visual tier rejected
//!
//! A pair matched by one tier is not scored again by a later one. Matches
//! form the edges of a graph whose connected components become groups; a
//! match that bridges two clusters merges them. Each member row carries the
//! most confident edge that attached it.
//!
//! The pass is planned in memory first ([`DupeGrouper::plan`]) and then
//! written with idempotent upserts, so re-running it over the same corpus
//! rewrites the same rows.
//!
//! # Example
//!
//! ```
//! use neardupe::duplicates::{DupeGrouper, GroupingConfig};
//! use neardupe::duplicates::models::Document;
//! use neardupe::store::{DupeStore, SqliteStore};
//!
//! let mut store = SqliteStore::open_in_memory().unwrap();
//! store.insert_document(&Document::new(1, "/a.pdf", 10, "pdf").with_sha256("same")).unwrap();
//! store.insert_document(&Document::new(2, "/b.pdf", 10, "pdf").with_sha256("same")).unwrap();
//!
//! let grouper = DupeGrouper::new(GroupingConfig::default());
//! let summary = grouper.run(&mut store).unwrap();
//!
//! assert_eq!(summary.groups_written, 1);
//! assert_eq!(store.count_groups().unwrap(), 1);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::identity::{content_identity, group_key};
use super::models::{Document, DocumentId, Evidence, MemberRecord, PageFingerprint, Reason};
use super::representative::select_representative;
use crate::fingerprint::hamming_distance;
use crate::progress::ProgressCallback;
use crate::similarity::{align_pages, partial_overlap, DEFAULT_MAX_SKEW, DEFAULT_PAGE_MATCH_THRESHOLD};
use crate::store::{DupeStore, StoreError};

/// Default maximum text fingerprint distance for a text-near match.
pub const DEFAULT_TEXT_THRESHOLD: u32 = 6;
/// Default maximum median page distance for a visual match.
pub const DEFAULT_VISUAL_THRESHOLD: u32 = 8;
/// Default minimum containment ratio for a partial match.
pub const DEFAULT_PARTIAL_THRESHOLD: f64 = 0.7;

/// Report progress every this many scored pairs.
const PROGRESS_STRIDE: usize = 256;

/// Configuration for a grouping pass.
#[derive(Clone)]
pub struct GroupingConfig {
    /// Maximum Hamming distance between text fingerprints (text-near tier).
    pub text_threshold: u32,
    /// Maximum median page distance of the best alignment (visual tier).
    pub visual_threshold: u32,
    /// Minimum containment ratio (partial tier).
    pub partial_threshold: f64,
    /// Maximum distance for two pages to count as the same page (partial tier).
    pub page_match_threshold: u32,
    /// Maximum tolerated page-count skew for alignment (visual tier).
    pub max_page_skew: f64,
    /// Only consider documents of this kind, if set.
    pub file_kind: Option<String>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for GroupingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupingConfig")
            .field("text_threshold", &self.text_threshold)
            .field("visual_threshold", &self.visual_threshold)
            .field("partial_threshold", &self.partial_threshold)
            .field("page_match_threshold", &self.page_match_threshold)
            .field("max_page_skew", &self.max_page_skew)
            .field("file_kind", &self.file_kind)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            visual_threshold: DEFAULT_VISUAL_THRESHOLD,
            partial_threshold: DEFAULT_PARTIAL_THRESHOLD,
            page_match_threshold: DEFAULT_PAGE_MATCH_THRESHOLD,
            max_page_skew: DEFAULT_MAX_SKEW,
            file_kind: None,
            progress_callback: None,
        }
    }
}

impl GroupingConfig {
    /// Set the text-near threshold.
    #[must_use]
    pub fn with_text_threshold(mut self, bits: u32) -> Self {
        self.text_threshold = bits;
        self
    }

    /// Set the visual threshold.
    #[must_use]
    pub fn with_visual_threshold(mut self, bits: u32) -> Self {
        self.visual_threshold = bits;
        self
    }

    /// Set the partial-overlap threshold.
    #[must_use]
    pub fn with_partial_threshold(mut self, ratio: f64) -> Self {
        self.partial_threshold = ratio;
        self
    }

    /// Set the per-page match threshold used by the partial tier.
    #[must_use]
    pub fn with_page_match_threshold(mut self, bits: u32) -> Self {
        self.page_match_threshold = bits;
        self
    }

    /// Set the maximum page-count skew for alignment.
    #[must_use]
    pub fn with_max_page_skew(mut self, skew: f64) -> Self {
        self.max_page_skew = skew;
        self
    }

    /// Restrict the pass to one file kind.
    #[must_use]
    pub fn with_file_kind(mut self, kind: impl Into<String>) -> Self {
        self.file_kind = Some(kind.into());
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check thresholds are within their meaningful ranges.
    ///
    /// # Errors
    ///
    /// Returns [`GroupingError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), GroupingError> {
        let bits = [
            ("text_threshold", self.text_threshold),
            ("visual_threshold", self.visual_threshold),
            ("page_match_threshold", self.page_match_threshold),
        ];
        for (name, value) in bits {
            if value > crate::fingerprint::FINGERPRINT_BITS {
                return Err(GroupingError::InvalidConfig(format!(
                    "{name} must be at most 64 bits, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.partial_threshold) {
            return Err(GroupingError::InvalidConfig(format!(
                "partial_threshold must be within 0..=1, got {}",
                self.partial_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.max_page_skew) {
            return Err(GroupingError::InvalidConfig(format!(
                "max_page_skew must be within 0..1, got {}",
                self.max_page_skew
            )));
        }
        Ok(())
    }
}

/// Per-tier counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    /// Canonical tier
    pub canonical: usize,
    /// Text-near tier
    pub text_near: usize,
    /// Visual tier
    pub visual: usize,
    /// Partial tier
    pub partial: usize,
}

impl TierCounts {
    fn bump(&mut self, reason: Reason) {
        *self.slot(reason) += 1;
    }

    fn slot(&mut self, reason: Reason) -> &mut usize {
        match reason {
            Reason::Canonical => &mut self.canonical,
            Reason::TextNear => &mut self.text_near,
            Reason::Visual => &mut self.visual,
            Reason::Partial => &mut self.partial,
        }
    }

    /// Sum over all tiers.
    #[must_use]
    pub fn total(&self) -> usize {
        self.canonical + self.text_near + self.visual + self.partial
    }
}

/// Statistics from one grouping pass.
#[derive(Debug, Clone, Default)]
pub struct GroupingSummary {
    /// Eligible documents read from the store
    pub documents: usize,
    /// Pairs scored by each tier
    pub pairs_compared: TierCounts,
    /// Pairs matched by each tier
    pub matches: TierCounts,
    /// Groups upserted
    pub groups_written: usize,
    /// Membership rows upserted
    pub members_written: usize,
    /// Wall time of the pass
    pub duration: Duration,
}

/// A group ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedGroup {
    /// Order-independent key of the member identities
    pub group_key: String,
    /// Chosen representative
    pub representative: DocumentId,
    /// One record per member, ordered by document id
    pub members: Vec<MemberRecord>,
}

/// Output of the in-memory planning step.
#[derive(Debug, Clone, Default)]
pub struct GroupingPlan {
    /// Groups ordered by key
    pub groups: Vec<PlannedGroup>,
    /// Counters gathered while planning
    pub summary: GroupingSummary,
}

/// Errors that can occur during a grouping pass.
#[derive(thiserror::Error, Debug)]
pub enum GroupingError {
    /// A threshold is out of range.
    #[error("Invalid grouping configuration: {0}")]
    InvalidConfig(String),

    /// The store failed; the pass was aborted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Documents and page fingerprints for one pass, indexed by position.
struct Corpus {
    documents: Vec<Document>,
    pages: Vec<Vec<u64>>,
}

impl Corpus {
    fn new(mut documents: Vec<Document>, mut pages: HashMap<DocumentId, Vec<PageFingerprint>>) -> Self {
        documents.sort_by_key(|d| d.id);
        documents.dedup_by_key(|d| d.id);
        let pages = documents
            .iter()
            .map(|d| {
                let mut prints = pages.remove(&d.id).unwrap_or_default();
                prints.sort_by_key(|p| p.page_index);
                prints.into_iter().map(|p| p.fingerprint).collect()
            })
            .collect();
        Self { documents, pages }
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// A match between documents at positions `a < b`.
struct Edge {
    a: usize,
    b: usize,
    evidence: Evidence,
}

#[derive(Default)]
struct MatchLedger {
    edges: Vec<Edge>,
    matched: HashSet<(usize, usize)>,
}

impl MatchLedger {
    fn is_matched(&self, a: usize, b: usize) -> bool {
        self.matched.contains(&(a.min(b), a.max(b)))
    }

    /// Mark a pair as settled without adding an edge.
    fn settle(&mut self, a: usize, b: usize) -> bool {
        self.matched.insert((a.min(b), a.max(b)))
    }

    fn record(&mut self, a: usize, b: usize, evidence: Evidence) {
        if self.settle(a, b) {
            self.edges.push(Edge {
                a: a.min(b),
                b: a.max(b),
                evidence,
            });
        }
    }
}

/// Union-find over corpus positions; the smaller position becomes the root.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = (ra.min(rb), ra.max(rb));
            self.parent[hi] = lo;
        }
    }
}

/// Grouping orchestrator.
pub struct DupeGrouper {
    config: GroupingConfig,
}

impl DupeGrouper {
    /// Create a grouper with the given configuration.
    #[must_use]
    pub fn new(config: GroupingConfig) -> Self {
        Self { config }
    }

    /// Create a grouper with default thresholds (6 / 8 / 0.7).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(GroupingConfig::default())
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    /// Run a full pass: load, plan, and upsert groups and memberships.
    ///
    /// # Errors
    ///
    /// Returns [`GroupingError::InvalidConfig`] before touching the store if a
    /// threshold is out of range, or [`GroupingError::Store`] as soon as any
    /// read or write fails. Upserts committed before the failure stay valid;
    /// the whole pass can simply be re-run.
    pub fn run<S: DupeStore + ?Sized>(&self, store: &mut S) -> Result<GroupingSummary, GroupingError> {
        let start = Instant::now();
        self.config.validate()?;

        let documents = store.load_documents(self.config.file_kind.as_deref())?;
        let ids: Vec<DocumentId> = documents.iter().map(|d| d.id).collect();
        let pages = store.load_page_fingerprints(&ids)?;
        log::info!(
            "Loaded {} candidate documents ({} with page fingerprints)",
            documents.len(),
            pages.len()
        );

        let GroupingPlan { groups, mut summary } = self.plan(documents, pages);

        self.phase_start("writing", groups.len());
        for (done, group) in groups.iter().enumerate() {
            let group_id = store.upsert_group(&group.group_key, group.representative)?;
            for member in &group.members {
                store.upsert_member(group_id, member)?;
                summary.members_written += 1;
            }
            summary.groups_written += 1;
            log::debug!(
                "Group {} ({}): {} members, representative {}",
                group_id,
                &group.group_key[..12.min(group.group_key.len())],
                group.members.len(),
                group.representative
            );
            self.phase_progress(done + 1);
        }
        self.phase_end("writing");

        summary.duration = start.elapsed();
        log::info!(
            "Grouping complete: {} groups, {} members written in {:.2?}",
            summary.groups_written,
            summary.members_written,
            summary.duration
        );
        Ok(summary)
    }

    /// Match and cluster documents without touching a store.
    ///
    /// `pages` maps document ids to their page fingerprints in any order.
    #[must_use]
    pub fn plan(
        &self,
        documents: Vec<Document>,
        pages: HashMap<DocumentId, Vec<PageFingerprint>>,
    ) -> GroupingPlan {
        let corpus = Corpus::new(documents, pages);
        let mut ledger = MatchLedger::default();
        let mut summary = GroupingSummary {
            documents: corpus.len(),
            ..GroupingSummary::default()
        };

        self.canonical_tier(&corpus, &mut ledger, &mut summary);
        self.text_tier(&corpus, &mut ledger, &mut summary);
        self.page_tiers(&corpus, &mut ledger, &mut summary);

        let groups = self.cluster(&corpus, &ledger);
        log::info!(
            "Matched {} pairs (canonical {}, text-near {}, visual {}, partial {}) into {} groups",
            summary.matches.total(),
            summary.matches.canonical,
            summary.matches.text_near,
            summary.matches.visual,
            summary.matches.partial,
            groups.len()
        );

        GroupingPlan { groups, summary }
    }

    /// Tier 1: documents sharing a canonical or whole-file hash.
    ///
    /// Either hash links two documents, so a copy whose canonical hash has not
    /// been computed yet still joins its bucket. Each bucket member is matched
    /// to the first, and every other pair inside it is settled so later tiers
    /// skip it.
    fn canonical_tier(&self, corpus: &Corpus, ledger: &mut MatchLedger, summary: &mut GroupingSummary) {
        let mut sets = DisjointSets::new(corpus.len());
        let mut by_canonical: HashMap<&str, usize> = HashMap::new();
        let mut by_file: HashMap<&str, usize> = HashMap::new();
        for (i, doc) in corpus.documents.iter().enumerate() {
            for (index, hash) in [
                (&mut by_canonical, doc.sha256_canonical.as_deref()),
                (&mut by_file, doc.sha256.as_deref()),
            ] {
                if let Some(hash) = hash.filter(|h| !h.is_empty()) {
                    let first = *index.entry(hash).or_insert(i);
                    sets.union(first, i);
                }
            }
        }

        let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..corpus.len() {
            buckets.entry(sets.find(i)).or_default().push(i);
        }

        for members in buckets.values().filter(|m| m.len() > 1) {
            let first = members[0];
            for &other in &members[1..] {
                summary.pairs_compared.bump(Reason::Canonical);
                summary.matches.bump(Reason::Canonical);
                ledger.record(first, other, Evidence::Canonical);
            }
            for (x, &a) in members.iter().enumerate().skip(1) {
                for &b in &members[x + 1..] {
                    ledger.settle(a, b);
                }
            }
        }
        log::info!("Canonical tier: {} matches", summary.matches.canonical);
    }

    /// Tier 2: Hamming distance between whole-document text fingerprints.
    fn text_tier(&self, corpus: &Corpus, ledger: &mut MatchLedger, summary: &mut GroupingSummary) {
        let docs = &corpus.documents;
        let pairs = unmatched_pairs(corpus.len(), ledger, |i| docs[i].text_fingerprint.is_some());
        let threshold = self.config.text_threshold;

        let results = self.score_pairs(Reason::TextNear, &pairs, |a, b| {
            let (fa, fb) = (docs[a].text_fingerprint?, docs[b].text_fingerprint?);
            let distance = hamming_distance(fa, fb);
            (distance <= threshold).then_some(Evidence::TextNear { distance })
        });
        self.record_results(corpus, Reason::TextNear, &pairs, results, ledger, summary);
    }

    /// Tiers 3 and 4: visual alignment, then partial overlap for the rejects.
    fn page_tiers(&self, corpus: &Corpus, ledger: &mut MatchLedger, summary: &mut GroupingSummary) {
        let pages = &corpus.pages;
        let pairs = unmatched_pairs(corpus.len(), ledger, |i| !pages[i].is_empty());

        let (visual_threshold, skew) = (self.config.visual_threshold, self.config.max_page_skew);
        let visual = self.score_pairs(Reason::Visual, &pairs, |a, b| {
            let alignment = align_pages(&pages[a], &pages[b], skew)?;
            (alignment.median <= visual_threshold).then_some(Evidence::Visual {
                distance: alignment.median,
                alignment,
            })
        });

        let rejected: Vec<(usize, usize)> = pairs
            .iter()
            .zip(&visual)
            .filter(|(_, r)| r.is_none())
            .map(|(&pair, _)| pair)
            .collect();
        self.record_results(corpus, Reason::Visual, &pairs, visual, ledger, summary);

        let (ratio_threshold, page_threshold) = (self.config.partial_threshold, self.config.page_match_threshold);
        let partial = self.score_pairs(Reason::Partial, &rejected, |a, b| {
            let overlap = partial_overlap(&pages[a], &pages[b], page_threshold)?;
            (overlap.matched_pages > 0 && overlap.containment >= ratio_threshold).then_some(Evidence::Partial {
                ratio: overlap.containment,
                jaccard: overlap.jaccard,
                relation: overlap.relation,
                matched_pages: overlap.matched_pages,
            })
        });
        self.record_results(corpus, Reason::Partial, &rejected, partial, ledger, summary);
    }

    /// Score pairs in parallel; results keep the order of `pairs`.
    fn score_pairs<F>(&self, tier: Reason, pairs: &[(usize, usize)], score: F) -> Vec<Option<Evidence>>
    where
        F: Fn(usize, usize) -> Option<Evidence> + Sync,
    {
        let phase = tier.as_str();
        self.phase_start(phase, pairs.len());
        let done = AtomicUsize::new(0);

        let results = pairs
            .par_iter()
            .map(|&(a, b)| {
                let result = score(a, b);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % PROGRESS_STRIDE == 0 || n == pairs.len() {
                    self.phase_progress(n);
                }
                result
            })
            .collect();

        self.phase_end(phase);
        results
    }

    fn record_results(
        &self,
        corpus: &Corpus,
        tier: Reason,
        pairs: &[(usize, usize)],
        results: Vec<Option<Evidence>>,
        ledger: &mut MatchLedger,
        summary: &mut GroupingSummary,
    ) {
        *summary.pairs_compared.slot(tier) += pairs.len();
        for (&(a, b), result) in pairs.iter().zip(results) {
            if let Some(evidence) = result {
                log::debug!(
                    "{} match: {} ~ {} (distance {})",
                    tier,
                    corpus.documents[a].path,
                    corpus.documents[b].path,
                    evidence.distance()
                );
                summary.matches.bump(tier);
                ledger.record(a, b, evidence);
            }
        }
        log::info!(
            "{} tier: {} pairs compared, {} matches",
            tier,
            pairs.len(),
            *summary.matches.slot(tier)
        );
    }

    /// Turn matched pairs into groups with representatives and member evidence.
    fn cluster(&self, corpus: &Corpus, ledger: &MatchLedger) -> Vec<PlannedGroup> {
        let docs = &corpus.documents;
        let mut sets = DisjointSets::new(corpus.len());
        for edge in &ledger.edges {
            sets.union(edge.a, edge.b);
        }

        // Most confident incident edge per document: tier, distance, partner id.
        let mut best: HashMap<usize, (&Edge, DocumentId)> = HashMap::new();
        for edge in &ledger.edges {
            for (end, partner) in [(edge.a, edge.b), (edge.b, edge.a)] {
                let partner_id = docs[partner].id;
                let candidate = (edge.evidence.reason().rank(), edge.evidence.distance(), partner_id);
                let replace = best.get(&end).map_or(true, |(current, current_partner)| {
                    candidate
                        < (
                            current.evidence.reason().rank(),
                            current.evidence.distance(),
                            *current_partner,
                        )
                });
                if replace {
                    best.insert(end, (edge, partner_id));
                }
            }
        }

        let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &position in best.keys() {
            components.entry(sets.find(position)).or_default().push(position);
        }

        let mut groups: Vec<PlannedGroup> = components
            .into_values()
            .filter(|members| members.len() > 1)
            .filter_map(|mut members| {
                members.sort_unstable();
                let member_docs: Vec<&Document> = members.iter().map(|&i| &docs[i]).collect();
                let representative = select_representative(&member_docs)?.id;
                let records = members
                    .iter()
                    .filter_map(|i| {
                        best.get(i).map(|(edge, _)| MemberRecord {
                            document_id: docs[*i].id,
                            evidence: edge.evidence.clone(),
                        })
                    })
                    .collect();
                Some(PlannedGroup {
                    group_key: group_key(member_docs.iter().map(|d| content_identity(d))),
                    representative,
                    members: records,
                })
            })
            .collect();

        groups.sort_by(|a, b| a.group_key.cmp(&b.group_key));
        groups
    }

    fn phase_start(&self, phase: &str, total: usize) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase, total);
        }
    }

    fn phase_progress(&self, current: usize) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_progress(current);
        }
    }

    fn phase_end(&self, phase: &str) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase);
        }
    }
}

/// All position pairs `a < b` where both are eligible and not yet matched.
fn unmatched_pairs(n: usize, ledger: &MatchLedger, eligible: impl Fn(usize) -> bool) -> Vec<(usize, usize)> {
    let candidates: Vec<usize> = (0..n).filter(|&i| eligible(i)).collect();
    let mut pairs = Vec::new();
    for (x, &a) in candidates.iter().enumerate() {
        for &b in &candidates[x + 1..] {
            if !ledger.is_matched(a, b) {
                pairs.push((a, b));
            }
        }
    }
    pairs
}
