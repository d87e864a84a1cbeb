use std::time::Duration;

use proptest::prelude::*;

use lexika::embedding::EmbeddingCache;

fn expected_vector(text: &str) -> Vec<f32> {
    vec![text.len() as f32, f32::from(text.as_bytes()[0])]
}

async fn compute(texts: Vec<String>) -> Result<Vec<Vec<f32>>, lexika::embedding::ProviderError> {
    Ok(texts.iter().map(|t| expected_vector(t)).collect())
}

proptest! {
    /// Output order must match input order for every mix of cached and
    /// uncached entries, including duplicates.
    #[test]
    fn test_get_or_compute_preserves_input_order(
        texts in proptest::collection::vec("[a-z0-9]{1,6}", 1..32),
        warm_prefix in 0usize..32,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("build runtime");

        rt.block_on(async {
            let cache = EmbeddingCache::new("prop-test", 128, Duration::from_secs(3600));

            // Warm an arbitrary prefix so hits and misses interleave.
            let warm: Vec<String> = texts.iter().take(warm_prefix).cloned().collect();
            if !warm.is_empty() {
                cache
                    .get_or_compute(&warm, compute)
                    .await
                    .expect("warm cache");
            }

            let vectors = cache
                .get_or_compute(&texts, compute)
                .await
                .expect("resolve vectors");

            prop_assert_eq!(vectors.len(), texts.len());
            for (text, vector) in texts.iter().zip(&vectors) {
                prop_assert_eq!(vector, &expected_vector(text));
            }
            Ok(())
        })?;
    }
}
