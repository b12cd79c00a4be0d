//! Redliner CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use redliner::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { force } => redliner::cli::commands::init::execute(force, cli.json).await,
        Commands::Contract(command) => {
            redliner::cli::commands::contract::execute(command, cli.json).await
        }
        Commands::Compose {
            contract_id,
            payload,
            edits,
        } => redliner::cli::commands::compose::execute(contract_id, payload, edits, cli.json).await,
        Commands::Chat {
            contract_id,
            message,
            context,
        } => redliner::cli::commands::chat::execute(contract_id, message, context, cli.json).await,
    };

    if let Err(err) = result {
        redliner::cli::handle_error(err, cli.json);
    }
}
