//! Engine wiring for CLI commands.
//!
//! Clients and stores are built once per invocation and handed to the
//! coordinator; nothing here is lazily memoized.

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::application::DraftCoordinator;
use crate::domain::models::Config;
use crate::infrastructure::package::FsPackageStorage;
use crate::infrastructure::providers::build_provider;
use crate::infrastructure::sqlite::{
    DatabaseConnection, SqliteDocumentStore, SqliteSnapshotRepository,
};
use crate::services::orchestrator::Orchestrator;

/// Open the database and make sure the schema exists.
pub async fn open_database(config: &Config) -> Result<DatabaseConnection> {
    let db = DatabaseConnection::from_config(&config.database).await?;
    db.init_schema().await?;
    Ok(db)
}

/// Build the full compose/chat engine from configuration.
///
/// The connection is returned alongside the coordinator so the caller can
/// close it on shutdown.
pub async fn build_coordinator(config: &Config) -> Result<(DraftCoordinator, DatabaseConnection)> {
    let db = open_database(config).await?;
    let documents = Arc::new(SqliteDocumentStore::new(db.pool().clone()));
    let snapshots = Arc::new(SqliteSnapshotRepository::new(db.pool().clone()));
    let packages = Arc::new(FsPackageStorage::new(config.storage.root.clone()));

    let primary = build_provider(&config.providers.primary)?;
    let secondary = match &config.providers.secondary {
        Some(secondary_config) => match build_provider(secondary_config) {
            Ok(provider) => Some(provider),
            Err(err) => {
                warn!(error = %err, "secondary provider unavailable, fallback disabled");
                None
            }
        },
        None => None,
    };

    let orchestrator = Orchestrator::new(
        primary,
        secondary,
        &config.providers,
        config.guardrail.clone(),
    );

    let coordinator = DraftCoordinator::new(
        documents,
        snapshots,
        packages,
        orchestrator,
        &config.matcher,
    );
    Ok((coordinator, db))
}
