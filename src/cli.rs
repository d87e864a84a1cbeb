//! Command-line surface over an in-process demo corpus.
//!
//! The engine itself is a library; these subcommands exist to exercise it
//! end to end from a shell. Every run seeds the same small vocabulary
//! corpus, so output is reproducible.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::EngineContext;
use crate::error::{LexikaError, Result};
use crate::graph::{EdgeKind, GraphEdge, GraphNode, NodeKind};
use crate::index::{Filter, MetadataValue};
use crate::search::{Collection, SearchOptions};

#[derive(Parser, Debug)]
#[command(name = "lexika", version, about = "Hybrid search and spaced-repetition engine")]
pub struct Cli {
    /// Path to a config file (overrides the global one)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the vocabulary corpus
    Search(SearchArgs),

    /// Record a review event and show the updated card
    Review(ReviewArgs),

    /// Show due cards for a learner
    Schedule(ScheduleArgs),

    /// Show graph neighbors of an item
    Related(RelatedArgs),

    /// Engine diagnostics
    Stats,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text
    pub query: String,

    /// Collection to search
    #[arg(long, default_value = "vocabulary")]
    pub collection: String,

    /// Maximum results
    #[arg(short = 'k', long, default_value_t = 10)]
    pub limit: usize,

    /// Similarity threshold override for the vector path
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Metadata equality filter, `field=value`, repeatable
    #[arg(long = "filter", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Disable RRF fusion (vector-first instead of hybrid)
    #[arg(long)]
    pub no_fusion: bool,
}

#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Item that was reviewed
    pub item_id: String,

    /// Recall quality, 0 (blackout) to 5 (perfect)
    pub quality: u8,

    /// Learner id
    #[arg(long, default_value = "demo")]
    pub user: String,

    /// How long the answer took
    #[arg(long, default_value_t = 0)]
    pub response_time_ms: u64,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Learner id
    #[arg(long, default_value = "demo")]
    pub user: String,

    /// Maximum entries
    #[arg(short = 'k', long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct RelatedArgs {
    /// Item to look up
    pub item_id: String,
}

pub async fn run(ctx: &EngineContext, cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Search(args) => run_search(ctx, cli.json, args).await,
        Commands::Review(args) => run_review(ctx, cli.json, args).await,
        Commands::Schedule(args) => run_schedule(ctx, cli.json, args),
        Commands::Related(args) => run_related(ctx, cli.json, args),
        Commands::Stats => run_stats(ctx, cli.json),
    }
}

async fn run_search(ctx: &EngineContext, json: bool, args: &SearchArgs) -> Result<()> {
    let collection: Collection = args.collection.parse()?;
    let options = SearchOptions {
        limit: args.limit,
        threshold: args.threshold,
        filters: parse_filters(&args.filters)?,
        enable_fusion: !args.no_fusion,
    };
    let response = ctx.search(&args.query, collection, &options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    println!(
        "{} results ({:?}, {} ms)",
        response.results.len(),
        response.source,
        response.processing_time_ms
    );
    for result in &response.results {
        println!("  {:>6.3}  {}", result.score, result.id);
    }
    Ok(())
}

async fn run_review(ctx: &EngineContext, json: bool, args: &ReviewArgs) -> Result<()> {
    let card = ctx
        .record_review(&args.user, &args.item_id, args.quality, args.response_time_ms)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&card)?);
        return Ok(());
    }
    println!(
        "{}: interval {:.1}d, ease {:.2}, next review {}",
        card.item_id,
        card.interval_days,
        card.ease_factor,
        card.next_review_at.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn run_schedule(ctx: &EngineContext, json: bool, args: &ScheduleArgs) -> Result<()> {
    let schedule = ctx.get_schedule(&args.user, args.limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }
    if schedule.is_empty() {
        println!("nothing due");
        return Ok(());
    }
    for entry in &schedule {
        let related = if entry.related_item_ids.is_empty() {
            String::new()
        } else {
            format!("  (related: {})", entry.related_item_ids.join(", "))
        };
        println!(
            "  {}  priority {:.2}{}",
            entry.item_id, entry.priority, related
        );
    }
    Ok(())
}

fn run_related(ctx: &EngineContext, json: bool, args: &RelatedArgs) -> Result<()> {
    let related = ctx.related(&args.item_id);

    if json {
        let rows: Vec<serde_json::Value> = related
            .iter()
            .map(|(node, weight)| {
                serde_json::json!({ "id": node.id, "kind": node.kind, "weight": weight })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for (node, weight) in &related {
        println!("  {weight:>6.3}  {}", node.id);
    }
    Ok(())
}

fn run_stats(ctx: &EngineContext, json: bool) -> Result<()> {
    let stats = ctx.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("indexed items:       {}", stats.indexed_items);
    println!(
        "embedding cache:     {} hits / {} misses ({:.0}%)",
        stats.cache.hits,
        stats.cache.misses,
        stats.cache.hit_rate() * 100.0
    );
    println!("graph nodes:         {}", stats.graph_nodes);
    println!("review cards:        {}", stats.review_cards);
    println!("queued interactions: {}", stats.queued_interactions);
    Ok(())
}

fn parse_filters(raw: &[String]) -> Result<Vec<Filter>> {
    raw.iter()
        .map(|raw_filter| {
            let (field, value) = raw_filter.split_once('=').ok_or_else(|| {
                LexikaError::InvalidQuery(format!("filter {raw_filter} is not FIELD=VALUE"))
            })?;
            Ok(Filter::eq(field, MetadataValue::from(value)))
        })
        .collect()
}

/// Seed the reproducible demo corpus: a handful of German vocabulary
/// items with metadata, plus a few graph relationships.
pub async fn seed_demo_corpus(ctx: &EngineContext) -> Result<()> {
    let entries = [
        ("hund", "der Hund dog canine loyal pet animal", "noun"),
        ("katze", "die Katze cat feline independent pet animal", "noun"),
        ("wolf", "der Wolf wolf wild canine pack animal", "noun"),
        ("haus", "das Haus house home building dwelling", "noun"),
        ("wohnung", "die Wohnung apartment flat dwelling", "noun"),
        ("laufen", "laufen to run walk move quickly", "verb"),
        ("rennen", "rennen to race run sprint fast", "verb"),
        ("schnell", "schnell fast quick rapid speedy", "adjective"),
    ];
    for (id, text, part_of_speech) in entries {
        let mut metadata = HashMap::new();
        metadata.insert("language".to_string(), MetadataValue::from("de"));
        metadata.insert(
            "part_of_speech".to_string(),
            MetadataValue::from(part_of_speech),
        );
        ctx.index_document(Collection::Vocabulary, id, text, metadata)
            .await?;
        ctx.add_graph_node(GraphNode {
            id: id.to_string(),
            kind: NodeKind::Word,
            properties: HashMap::new(),
        });
    }

    let relations = [
        ("hund", "wolf", EdgeKind::Related, 0.8),
        ("wolf", "hund", EdgeKind::Related, 0.8),
        ("hund", "katze", EdgeKind::Related, 0.6),
        ("katze", "hund", EdgeKind::Related, 0.6),
        ("haus", "wohnung", EdgeKind::Synonym, 0.7),
        ("wohnung", "haus", EdgeKind::Synonym, 0.7),
        ("laufen", "rennen", EdgeKind::Synonym, 0.9),
        ("rennen", "laufen", EdgeKind::Synonym, 0.9),
        ("rennen", "schnell", EdgeKind::Related, 0.5),
    ];
    for (source, target, kind, weight) in relations {
        ctx.add_graph_edge(GraphEdge {
            source_id: source.to_string(),
            target_id: target.to_string(),
            kind,
            weight,
        })?;
    }
    Ok(())
}
