use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod error;
mod subcommands;

/// Parses USFM, USX and TSV Scripture sources into sequences, blocks and scopes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert documents to JSON
    Convert(subcommands::convert::Args),

    /// Print the sequence and block outline of a document
    Inspect(subcommands::inspect::Args),
}

fn main() -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert(args) => subcommands::convert::run(&args),
        Commands::Inspect(args) => subcommands::inspect::run(&args),
    }
}
