//! Implementation of the `redliner init` command.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

use crate::cli::engine::open_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.database_initialized {
            lines.push("\nDatabase initialized at .redliner/redliner.db".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(force: bool, json_mode: bool) -> Result<()> {
    let redliner_dir = PathBuf::from(".redliner");

    if redliner_dir.exists() && !force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            directories_created: vec![],
            database_initialized: false,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    if force && redliner_dir.exists() {
        fs::remove_dir_all(&redliner_dir)
            .await
            .context("Failed to remove existing .redliner directory")?;
    }

    let mut directories_created = vec![];
    let config = Config::default();
    let dirs = [redliner_dir.clone(), PathBuf::from(&config.storage.root)];
    for dir in &dirs {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        directories_created.push(dir.display().to_string());
    }

    let config_yaml =
        serde_yaml::to_string(&config).context("Failed to serialize default config")?;
    fs::write(redliner_dir.join("config.yaml"), config_yaml)
        .await
        .context("Failed to write config.yaml")?;

    let db = open_database(&config).await?;
    db.close().await;

    let output_data = InitOutput {
        success: true,
        message: "Initialized redliner project.".to_string(),
        directories_created,
        database_initialized: true,
    };
    output(&output_data, json_mode);
    Ok(())
}
