mod analysis;
mod app;
mod cli;
mod config;
mod error;
mod filter;
mod git;
mod reporter;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Handle shell completion generation
    if let Some(shell) = args.completions {
        cli::generate_completions(shell);
        return Ok(());
    }

    // RUST_LOG wins; otherwise --verbose shows every line decision
    let filter = if args.verbose {
        "info,commit_analysis=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let app = app::App::new(args)?;
    app.run()?;

    Ok(())
}
