use neardupe::duplicates::{group_key, select_representative, Document};
use neardupe::fingerprint::{hamming_distance, simhash_text};
use neardupe::similarity::{align_pages, partial_overlap, Relation, DEFAULT_MAX_SKEW};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_hamming_identity_and_symmetry(a in any::<u64>(), b in any::<u64>()) {
        prop_assert_eq!(hamming_distance(a, a), 0);
        prop_assert_eq!(hamming_distance(a, b), hamming_distance(b, a));
        prop_assert!(hamming_distance(a, b) <= 64);
        prop_assert_eq!(hamming_distance(a, !a), 64);
    }

    #[test]
    fn test_hamming_triangle_inequality(a in any::<u64>(), b in any::<u64>(), c in any::<u64>()) {
        prop_assert!(hamming_distance(a, c) <= hamming_distance(a, b) + hamming_distance(b, c));
    }

    #[test]
    fn test_simhash_is_deterministic(text in "[a-z ]{0,200}") {
        prop_assert_eq!(simhash_text(&text), simhash_text(&text));
    }

    #[test]
    fn test_group_key_permutation_invariance(
        mut ids in prop::collection::vec("[0-9a-f]{8}", 1..12),
        seed in any::<u64>(),
    ) {
        let expected = group_key(ids.iter());
        // Fisher-Yates driven by the seed
        let mut state = seed | 1;
        for i in (1..ids.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            ids.swap(i, (state % (i as u64 + 1)) as usize);
        }
        prop_assert_eq!(group_key(ids.iter()), expected.clone());

        // Duplicated identities do not change the key
        let doubled: Vec<&String> = ids.iter().chain(ids.iter()).collect();
        prop_assert_eq!(group_key(doubled), expected);
    }

    #[test]
    fn test_alignment_of_identical_sequences(pages in prop::collection::vec(any::<u64>(), 1..30)) {
        let alignment = align_pages(&pages, &pages, DEFAULT_MAX_SKEW).unwrap();
        prop_assert_eq!(alignment.median, 0);
        prop_assert_eq!(alignment.a_start, 0);
        prop_assert_eq!(alignment.b_start, 0);
        prop_assert_eq!(alignment.a_len, pages.len());
        prop_assert_eq!(alignment.b_len, pages.len());
    }

    #[test]
    fn test_overlap_bounds_and_symmetry(
        a in prop::collection::vec(any::<u64>(), 1..20),
        b in prop::collection::vec(any::<u64>(), 1..20),
        threshold in 0u32..16,
    ) {
        let forward = partial_overlap(&a, &b, threshold).unwrap();
        let backward = partial_overlap(&b, &a, threshold).unwrap();

        prop_assert!((0.0..=1.0).contains(&forward.containment));
        prop_assert!((0.0..=1.0).contains(&forward.jaccard));
        prop_assert!(forward.jaccard <= forward.containment + 1e-12);
        prop_assert!((forward.containment - backward.containment).abs() < 1e-12);
        prop_assert!((forward.jaccard - backward.jaccard).abs() < 1e-12);
        prop_assert!(forward.matched_pages <= a.len().min(b.len()));

        let mirrored = match forward.relation {
            Relation::Subset => Relation::Superset,
            Relation::Superset => Relation::Subset,
            other => other,
        };
        prop_assert_eq!(backward.relation, mirrored);
    }

    #[test]
    fn test_representative_ignores_input_order(
        specs in prop::collection::vec((0u32..5, any::<bool>(), 0u64..2_000_000), 1..8),
    ) {
        let docs: Vec<Document> = specs
            .iter()
            .enumerate()
            .map(|(i, &(pages, text, pixels))| {
                Document::new(i as i64 + 1, format!("/d/{i}"), 1, "pdf")
                    .with_page_count(pages)
                    .with_has_text(text)
                    .with_avg_page_pixels(pixels)
            })
            .collect();
        let forward: Vec<&Document> = docs.iter().collect();
        let backward: Vec<&Document> = docs.iter().rev().collect();

        prop_assert_eq!(
            select_representative(&forward).map(|d| d.id),
            select_representative(&backward).map(|d| d.id)
        );
    }
}
