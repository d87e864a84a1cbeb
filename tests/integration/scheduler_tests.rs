use lexika::Config;
use lexika::LexikaError;
use lexika::app::EngineContext;
use lexika::cli::seed_demo_corpus;

async fn demo_context() -> EngineContext {
    let ctx = EngineContext::new(Config::default()).expect("build context");
    seed_demo_corpus(&ctx).await.expect("seed corpus");
    ctx
}

#[tokio::test]
async fn test_review_flow_follows_sm2_ladder() {
    let ctx = demo_context().await;

    let card = ctx.record_review("anna", "hund", 5, 900).await.expect("review");
    assert_eq!(card.repetition_count, 1);
    assert!((card.interval_days - 1.0).abs() < 1e-6);
    assert!((card.ease_factor - 2.6).abs() < 1e-4);

    let card = ctx.record_review("anna", "hund", 5, 700).await.expect("review");
    assert_eq!(card.repetition_count, 2);
    assert!((card.interval_days - 6.0).abs() < 1e-6);
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_failed_review_resets_card() {
    let ctx = demo_context().await;

    for _ in 0..3 {
        ctx.record_review("anna", "katze", 5, 900).await.expect("review");
    }
    let card = ctx.record_review("anna", "katze", 1, 4000).await.expect("review");

    assert_eq!(card.repetition_count, 0);
    assert!((card.interval_days - 1.0).abs() < 1e-6);
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_fresh_reviews_are_not_due_yet() {
    let ctx = demo_context().await;

    ctx.record_review("anna", "hund", 4, 900).await.expect("review");
    ctx.record_review("anna", "katze", 2, 2000).await.expect("review");

    // Every updated card is at least a day out.
    let schedule = ctx.get_schedule("anna", 10).expect("schedule");
    assert!(schedule.is_empty());
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_schedules_are_per_user() {
    let ctx = demo_context().await;

    ctx.record_review("anna", "hund", 4, 900).await.expect("review");
    let schedule = ctx.get_schedule("ben", 10).expect("schedule");
    assert!(schedule.is_empty());
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_invalid_review_and_schedule_inputs() {
    let ctx = demo_context().await;

    assert!(matches!(
        ctx.record_review("anna", "hund", 9, 900).await,
        Err(LexikaError::InvalidQuery(_))
    ));
    assert!(matches!(
        ctx.get_schedule("anna", 0),
        Err(LexikaError::InvalidQuery(_))
    ));
    assert!(matches!(
        ctx.get_schedule("anna", 500),
        Err(LexikaError::InvalidQuery(_))
    ));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_related_items_come_from_the_graph() {
    let ctx = demo_context().await;

    let related = ctx.related("hund");
    let ids: Vec<&str> = related.iter().map(|(n, _)| n.id.as_str()).collect();
    assert!(ids.contains(&"wolf"));
    assert!(ids.contains(&"katze"));
    // Direct strong edge outranks the weaker one.
    assert_eq!(ids[0], "wolf");
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_stats_reflect_activity() {
    let ctx = demo_context().await;

    ctx.record_review("anna", "hund", 4, 900).await.expect("review");
    let stats = ctx.stats();

    assert_eq!(stats.indexed_items, 8);
    assert_eq!(stats.graph_nodes, 8);
    assert_eq!(stats.review_cards, 1);
    assert_eq!(stats.queued_interactions, 1);
    ctx.shutdown().await;
}
