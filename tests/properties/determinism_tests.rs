use std::collections::HashMap;

use proptest::prelude::*;

use lexika::embedding::l2_normalize;
use lexika::search::{FusionConfig, SearchResult, Source, fuse};

fn results(ids: &[String], source: Source) -> Vec<SearchResult> {
    ids.iter()
        .enumerate()
        .map(|(rank, id)| SearchResult {
            id: id.clone(),
            score: 1.0 - rank as f32 * 0.01,
            source,
            metadata: HashMap::new(),
        })
        .collect()
}

proptest! {
    #[test]
    fn test_fusion_repeated_calls_bit_identical(
        vector_ids in proptest::collection::vec("[a-z]{1,5}", 0..20),
        lexical_ids in proptest::collection::vec("[a-z]{1,5}", 0..20),
    ) {
        let vector = results(&vector_ids, Source::Vector);
        let lexical = results(&lexical_ids, Source::Lexical);
        let config = FusionConfig::default();

        let first = fuse(&vector, &lexical, &config);
        let second = fuse(&vector, &lexical, &config);

        let a: Vec<(String, u32)> = first
            .iter()
            .map(|r| (r.id.clone(), r.score.to_bits()))
            .collect();
        let b: Vec<(String, u32)> = second
            .iter()
            .map(|r| (r.id.clone(), r.score.to_bits()))
            .collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn test_fusion_scores_sorted_and_bounded(
        vector_ids in proptest::collection::vec("[a-z]{1,5}", 0..20),
        lexical_ids in proptest::collection::vec("[a-z]{1,5}", 0..20),
    ) {
        let fused = fuse(
            &results(&vector_ids, Source::Vector),
            &results(&lexical_ids, Source::Lexical),
            &FusionConfig::default(),
        );

        for window in fused.windows(2) {
            prop_assert!(window[0].score >= window[1].score);
        }
        for result in &fused {
            prop_assert!((0.0..=1.0).contains(&result.score));
            prop_assert_eq!(result.source, Source::Hybrid);
        }
        if let Some(top) = fused.first() {
            prop_assert!((top.score - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fusion_output_ids_unique(
        vector_ids in proptest::collection::vec("[a-z]{1,3}", 0..20),
        lexical_ids in proptest::collection::vec("[a-z]{1,3}", 0..20),
    ) {
        let fused = fuse(
            &results(&vector_ids, Source::Vector),
            &results(&lexical_ids, Source::Lexical),
            &FusionConfig::default(),
        );

        let mut ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        prop_assert_eq!(before, ids.len());
    }

    #[test]
    fn test_l2_normalize_yields_unit_or_zero(
        values in proptest::collection::vec(-1000.0f32..1000.0, 1..64),
    ) {
        let mut vector = values;
        l2_normalize(&mut vector);

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        prop_assert!(norm.abs() < 1e-3 || (norm - 1.0).abs() < 1e-3);
    }
}
