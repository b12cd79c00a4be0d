//! SQLite-backed contract document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ContractDocument;
use crate::domain::ports::DocumentStore;

/// Stores extracted contract documents in the `contracts` table.
///
/// The engine only reads through the [`DocumentStore`] port; `upsert` is
/// for the CLI's `contract add` ingestion path.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a contract document.
    pub async fn upsert(&self, document: &ContractDocument) -> DomainResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO contracts (contract_id, plain_text, html, package_ref, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&document.contract_id)
        .bind(&document.plain_text)
        .bind(&document.html)
        .bind(&document.package_ref)
        .bind(document.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, contract_id: &str) -> DomainResult<Option<ContractDocument>> {
        let row: Option<(String, String, Option<String>, Option<String>, String)> =
            sqlx::query_as(
                "SELECT contract_id, plain_text, html, package_ref, updated_at
                 FROM contracts WHERE contract_id = ?1",
            )
            .bind(contract_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(contract_id, plain_text, html, package_ref, updated_at)| {
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|e| DomainError::SerializationError(format!("bad updated_at: {e}")))?
                .with_timezone(&Utc);
            Ok(ContractDocument {
                contract_id,
                plain_text,
                html,
                package_ref,
                updated_at,
            })
        })
        .transpose()
    }
}
