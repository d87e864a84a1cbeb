use lexika::Config;
use lexika::LexikaError;
use lexika::app::EngineContext;
use lexika::cli::seed_demo_corpus;
use lexika::index::{Filter, MetadataValue};
use lexika::search::{Collection, SearchOptions, Source};

async fn demo_context() -> EngineContext {
    let ctx = EngineContext::new(Config::default()).expect("build context");
    seed_demo_corpus(&ctx).await.expect("seed corpus");
    ctx
}

#[tokio::test]
async fn test_hybrid_search_end_to_end() {
    let ctx = demo_context().await;

    let response = ctx
        .search("dog pet", Collection::Vocabulary, &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(response.source, Source::Hybrid);
    assert!(!response.results.is_empty());
    assert_eq!(response.results[0].id, "hund");
    for result in &response.results {
        assert!((0.0..=1.0).contains(&result.score));
    }
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_high_threshold_still_serves_lexical_matches() {
    let ctx = demo_context().await;

    // Hash embeddings over this corpus never reach 0.99 similarity, so
    // the vector path contributes nothing; keyword matches still rank.
    let options = SearchOptions {
        threshold: Some(0.99),
        ..SearchOptions::default()
    };
    let response = ctx
        .search("dog pet", Collection::Vocabulary, &options)
        .await
        .expect("search");

    assert!(!response.results.is_empty());
    assert!(response.results.iter().any(|r| r.id == "hund"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_vector_only_mode() {
    let ctx = demo_context().await;

    let options = SearchOptions {
        enable_fusion: false,
        threshold: Some(0.0),
        ..SearchOptions::default()
    };
    let response = ctx
        .search("dog pet", Collection::Vocabulary, &options)
        .await
        .expect("search");

    assert_eq!(response.source, Source::Vector);
    assert!(!response.results.is_empty());
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_metadata_filter_restricts_vector_results() {
    let ctx = demo_context().await;

    let options = SearchOptions {
        enable_fusion: false,
        threshold: Some(0.0),
        filters: vec![Filter::eq("part_of_speech", MetadataValue::from("verb"))],
        ..SearchOptions::default()
    };
    let response = ctx
        .search("run fast", Collection::Vocabulary, &options)
        .await
        .expect("search");

    assert!(!response.results.is_empty());
    for result in &response.results {
        assert_eq!(
            result.metadata.get("part_of_speech"),
            Some(&MetadataValue::from("verb")),
            "non-verb {} leaked through the filter",
            result.id
        );
    }
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_collections_are_isolated() {
    let ctx = demo_context().await;

    // Nothing was indexed into images; neither path may leak
    // vocabulary entries into it.
    let response = ctx
        .search("dog pet", Collection::Images, &SearchOptions::default())
        .await
        .expect("search");

    assert!(response.results.is_empty());
    assert_eq!(response.total_results, 0);
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_invalid_requests_rejected() {
    let ctx = demo_context().await;

    let zero_limit = SearchOptions {
        limit: 0,
        ..SearchOptions::default()
    };
    assert!(matches!(
        ctx.search("dog", Collection::Vocabulary, &zero_limit).await,
        Err(LexikaError::InvalidQuery(_))
    ));

    let bad_threshold = SearchOptions {
        threshold: Some(1.5),
        ..SearchOptions::default()
    };
    assert!(matches!(
        ctx.search("dog", Collection::Vocabulary, &bad_threshold)
            .await,
        Err(LexikaError::InvalidQuery(_))
    ));

    assert!(matches!(
        ctx.search("   ", Collection::Vocabulary, &SearchOptions::default())
            .await,
        Err(LexikaError::InvalidQuery(_))
    ));

    assert!("paintings".parse::<Collection>().is_err());
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_remove_document_drops_it_from_both_paths() {
    let ctx = demo_context().await;
    ctx.remove_document(Collection::Vocabulary, "hund");

    let options = SearchOptions {
        threshold: Some(0.0),
        ..SearchOptions::default()
    };
    let response = ctx
        .search("dog pet", Collection::Vocabulary, &options)
        .await
        .expect("search");

    assert!(response.results.iter().all(|r| r.id != "hund"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_repeated_queries_hit_the_cache() {
    let ctx = demo_context().await;

    for _ in 0..3 {
        ctx.search("dog pet", Collection::Vocabulary, &SearchOptions::default())
            .await
            .expect("search");
    }

    let stats = ctx.stats();
    assert!(stats.cache.hits >= 2, "expected cache hits, got {stats:?}");
    ctx.shutdown().await;
}
