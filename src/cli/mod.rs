//! Command-line interface.

pub mod commands;
pub mod engine;
pub mod output;
pub mod types;

pub use output::{output, CommandOutput};
pub use types::{Cli, Commands, ContractCommands};

/// Print an error and exit with a failure code, honoring `--json`.
pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let value = serde_json::json!({ "success": false, "error": format!("{err:#}") });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        );
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
