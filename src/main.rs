//! lexika - hybrid semantic search and spaced-repetition scheduling.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lexika::Config;
use lexika::app::EngineContext;
use lexika::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                let code = match &e {
                    lexika::LexikaError::InvalidQuery(_) => "invalid_query",
                    lexika::LexikaError::ProviderUnavailable(_) => "provider_unavailable",
                    lexika::LexikaError::TotalFailure(_) => "total_failure",
                    _ => "error",
                };
                let error_json = serde_json::json!({
                    "error": true,
                    "code": code,
                    "message": e.to_string(),
                });
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> lexika::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let ctx = EngineContext::new(config)?;
    cli::seed_demo_corpus(&ctx).await?;
    let outcome = cli::run(&ctx, cli).await;
    ctx.shutdown().await;
    outcome
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,lexika=info",
        1 => "info,lexika=debug",
        2 => "debug,lexika=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
