use std::io::Write;
use std::time::Duration;

use lexika::Config;
use lexika::config::{GraphConfig, SchedulerConfig, SearchConfig};

#[test]
fn test_defaults_match_documented_tunables() {
    let config = Config::default();

    assert_eq!(config.embedding.dimension, 384);
    assert_eq!(config.embedding.batch_size, 100);
    assert_eq!(config.embedding.max_concurrency, 5);
    assert_eq!(config.embedding.cache_ttl, Duration::from_secs(24 * 60 * 60));

    assert_eq!(config.index.m, 16);
    assert_eq!(config.index.ef_construction, 200);
    assert_eq!(config.index.ef_search, 50);

    let SearchConfig {
        rrf_k,
        vector_weight,
        lexical_weight,
        similarity_threshold,
        ..
    } = config.search;
    assert!((rrf_k - 60.0).abs() < f32::EPSILON);
    assert!((vector_weight - 1.2).abs() < f32::EPSILON);
    assert!((lexical_weight - 1.0).abs() < f32::EPSILON);
    assert!((similarity_threshold - 0.7).abs() < f32::EPSILON);

    let GraphConfig {
        max_depth,
        decay,
        min_edge_weight,
    } = config.graph;
    assert_eq!(max_depth, 3);
    assert!((decay - 0.8).abs() < f32::EPSILON);
    assert!((min_edge_weight - 0.3).abs() < f32::EPSILON);

    let SchedulerConfig {
        blend_weight,
        confidence_gate,
        flush_interval,
        ..
    } = config.scheduler;
    assert!((blend_weight - 0.5).abs() < f32::EPSILON);
    assert!((confidence_gate - 0.5).abs() < f32::EPSILON);
    assert_eq!(flush_interval, Duration::from_secs(30));

    assert_eq!(config.resilience.failure_threshold, 5);
    assert_eq!(config.resilience.reset_timeout, Duration::from_secs(60));
    assert_eq!(config.resilience.max_retries, 2);
}

#[test]
fn test_partial_file_patches_only_named_keys() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    write!(
        file,
        r#"
[index]
m = 32

[search]
similarity_threshold = 0.5
"#
    )
    .expect("write temp config");

    let config = Config::load(Some(file.path())).expect("load config");

    assert_eq!(config.index.m, 32);
    assert!((config.search.similarity_threshold - 0.5).abs() < f32::EPSILON);
    // Untouched keys keep their defaults.
    assert_eq!(config.index.ef_construction, 200);
    assert!((config.search.rrf_k - 60.0).abs() < f32::EPSILON);
    assert_eq!(config.embedding.dimension, 384);
}

#[test]
fn test_durations_accept_humantime_strings() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    write!(
        file,
        r#"
[embedding]
cache_ttl = "12h"
timeout = "2s"

[scheduler]
flush_interval = "45s"
"#
    )
    .expect("write temp config");

    let config = Config::load(Some(file.path())).expect("load config");
    assert_eq!(config.embedding.cache_ttl, Duration::from_secs(12 * 60 * 60));
    assert_eq!(config.embedding.timeout, Duration::from_secs(2));
    assert_eq!(config.scheduler.flush_interval, Duration::from_secs(45));
}

#[test]
fn test_invalid_values_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    write!(
        file,
        r#"
[search]
similarity_threshold = 1.5
"#
    )
    .expect("write temp config");

    assert!(Config::load(Some(file.path())).is_err());
}

#[test]
fn test_malformed_toml_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    write!(file, "this is not toml [[").expect("write temp config");

    assert!(Config::load(Some(file.path())).is_err());
}
