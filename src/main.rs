//! Cirrus CLI — intents in, ordered cloud resource plans out.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cirrus",
    version,
    about = "Lower infrastructure intents into ordered cloud resource plans, then link and deploy them"
)]
struct Cli {
    #[command(subcommand)]
    command: cirrus::cli::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CIRRUS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cirrus::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
