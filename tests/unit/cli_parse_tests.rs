use clap::Parser;

use lexika::cli::{Cli, Commands};

#[test]
fn test_search_args_parse() {
    let cli = Cli::try_parse_from([
        "lexika", "search", "dog pet", "-k", "5", "--threshold", "0.8", "--filter",
        "language=de", "--no-fusion", "--json",
    ])
    .expect("parse");

    assert!(cli.json);
    let Commands::Search(args) = &cli.command else {
        panic!("expected search subcommand");
    };
    assert_eq!(args.query, "dog pet");
    assert_eq!(args.limit, 5);
    assert_eq!(args.threshold, Some(0.8));
    assert_eq!(args.filters, vec!["language=de".to_string()]);
    assert!(args.no_fusion);
    assert_eq!(args.collection, "vocabulary");
}

#[test]
fn test_review_args_parse() {
    let cli = Cli::try_parse_from(["lexika", "review", "hund", "4", "--user", "anna"])
        .expect("parse");

    let Commands::Review(args) = &cli.command else {
        panic!("expected review subcommand");
    };
    assert_eq!(args.item_id, "hund");
    assert_eq!(args.quality, 4);
    assert_eq!(args.user, "anna");
    assert_eq!(args.response_time_ms, 0);
}

#[test]
fn test_schedule_defaults() {
    let cli = Cli::try_parse_from(["lexika", "schedule"]).expect("parse");

    let Commands::Schedule(args) = &cli.command else {
        panic!("expected schedule subcommand");
    };
    assert_eq!(args.user, "demo");
    assert_eq!(args.limit, 20);
}

#[test]
fn test_verbosity_counts() {
    let cli = Cli::try_parse_from(["lexika", "-vv", "stats"]).expect("parse");
    assert_eq!(cli.verbose, 2);
    assert!(!cli.quiet);
}

#[test]
fn test_missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["lexika"]).is_err());
}
