//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "redliner")]
#[command(about = "Redliner - AI-assisted contract redlining engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize redliner configuration and database
    Init {
        /// Force reinitialization even if already initialized
        #[arg(short, long)]
        force: bool,
    },

    /// Contract document commands
    #[command(subcommand)]
    Contract(ContractCommands),

    /// Compose a redlined draft from a suggestion/edit payload
    Compose {
        /// Contract id
        contract_id: String,

        /// Path to a JSON payload with `suggestions` and `agentEdits`
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Inline JSON payload (alternative to --payload)
        #[arg(short, long, conflicts_with = "payload")]
        edits: Option<String>,
    },

    /// Chat about a contract
    Chat {
        /// Contract id
        contract_id: String,

        /// User message
        message: String,

        /// Additional free-text context for the assistant
        #[arg(short, long)]
        context: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ContractCommands {
    /// Add (or replace) a contract document
    Add {
        /// Contract id
        contract_id: String,

        /// Path to the plain-text file
        #[arg(short, long)]
        text: PathBuf,

        /// Path to the HTML markup file
        #[arg(long)]
        html: Option<PathBuf>,

        /// Structured package reference
        #[arg(long)]
        package_ref: Option<String>,
    },

    /// Show a stored contract document
    Show {
        /// Contract id
        contract_id: String,
    },
}
