//! SQLite-backed snapshot repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DraftSnapshot;
use crate::domain::ports::SnapshotRepository;

/// Persists draft snapshots in the `draft_snapshots` table.
///
/// `upsert` uses INSERT OR REPLACE: concurrent writers for the same
/// fingerprint are a last-writer-wins race, never a constraint failure.
pub struct SqliteSnapshotRepository {
    pool: SqlitePool,
}

impl SqliteSnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

type SnapshotRow = (
    String,         // contract_id
    String,         // draft_key
    Option<String>, // html
    String,         // plain_text
    Option<String>, // summary
    String,         // applied_changes (json)
    Option<String>, // asset_ref
    String,         // provider
    String,         // model
    i64,            // matched_count
    i64,            // unmatched_count
    String,         // metadata (json)
    String,         // created_at (rfc3339)
);

fn snapshot_from_row(row: SnapshotRow) -> DomainResult<DraftSnapshot> {
    let created_at = DateTime::parse_from_rfc3339(&row.12)
        .map_err(|e| DomainError::SerializationError(format!("bad created_at: {e}")))?
        .with_timezone(&Utc);

    Ok(DraftSnapshot {
        contract_id: row.0,
        draft_key: row.1,
        html: row.2,
        plain_text: row.3,
        summary: row.4,
        applied_changes: serde_json::from_str(&row.5)?,
        asset_ref: row.6,
        provider: row.7,
        model: row.8,
        matched_count: row.9 as u32,
        unmatched_count: row.10 as u32,
        metadata: serde_json::from_str(&row.11)?,
        created_at,
    })
}

#[async_trait]
impl SnapshotRepository for SqliteSnapshotRepository {
    async fn get(
        &self,
        contract_id: &str,
        draft_key: &str,
    ) -> DomainResult<Option<DraftSnapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "SELECT contract_id, draft_key, html, plain_text, summary, applied_changes,
                    asset_ref, provider, model, matched_count, unmatched_count, metadata,
                    created_at
             FROM draft_snapshots
             WHERE contract_id = ?1 AND draft_key = ?2",
        )
        .bind(contract_id)
        .bind(draft_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(snapshot_from_row).transpose()
    }

    async fn upsert(&self, snapshot: &DraftSnapshot) -> DomainResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO draft_snapshots
                (contract_id, draft_key, html, plain_text, summary, applied_changes,
                 asset_ref, provider, model, matched_count, unmatched_count, metadata,
                 created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&snapshot.contract_id)
        .bind(&snapshot.draft_key)
        .bind(&snapshot.html)
        .bind(&snapshot.plain_text)
        .bind(&snapshot.summary)
        .bind(serde_json::to_string(&snapshot.applied_changes)?)
        .bind(&snapshot.asset_ref)
        .bind(&snapshot.provider)
        .bind(&snapshot.model)
        .bind(i64::from(snapshot.matched_count))
        .bind(i64::from(snapshot.unmatched_count))
        .bind(serde_json::to_string(&snapshot.metadata)?)
        .bind(snapshot.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite::DatabaseConnection;
    use std::collections::HashMap;

    async fn repository() -> SqliteSnapshotRepository {
        let db = DatabaseConnection::new("sqlite::memory:", 5)
            .await
            .expect("failed to create database connection");
        db.init_schema().await.expect("failed to create schema");
        SqliteSnapshotRepository::new(db.pool().clone())
    }

    fn snapshot(contract_id: &str, draft_key: &str, matched: u32) -> DraftSnapshot {
        let mut metadata = HashMap::new();
        metadata.insert(
            "unmatched_edits".to_string(),
            serde_json::json!([{"edit_id": "e9", "reason": "no matching clause found"}]),
        );
        DraftSnapshot {
            contract_id: contract_id.to_string(),
            draft_key: draft_key.to_string(),
            html: Some("<body><p>Patched.</p></body>".to_string()),
            plain_text: "Patched.".to_string(),
            summary: Some("One change applied.".to_string()),
            applied_changes: vec!["Replaced \"old\"".to_string()],
            asset_ref: None,
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            matched_count: matched,
            unmatched_count: 1,
            metadata,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = repository().await;
        assert!(repo.get("c1", "key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let repo = repository().await;
        let original = snapshot("c1", "key-1", 3);
        repo.upsert(&original).await.unwrap();

        let loaded = repo.get("c1", "key-1").await.unwrap().unwrap();
        assert_eq!(loaded.plain_text, "Patched.");
        assert_eq!(loaded.matched_count, 3);
        assert_eq!(loaded.applied_changes, original.applied_changes);
        assert_eq!(loaded.metadata, original.metadata);
        assert_eq!(
            loaded.created_at.timestamp(),
            original.created_at.timestamp()
        );
    }

    #[tokio::test]
    async fn test_upsert_is_last_writer_wins() {
        let repo = repository().await;
        repo.upsert(&snapshot("c1", "key-1", 1)).await.unwrap();

        let mut second = snapshot("c1", "key-1", 2);
        second.plain_text = "Second write.".to_string();
        repo.upsert(&second).await.unwrap();

        let loaded = repo.get("c1", "key-1").await.unwrap().unwrap();
        assert_eq!(loaded.plain_text, "Second write.");
        assert_eq!(loaded.matched_count, 2);
    }

    #[tokio::test]
    async fn test_keys_are_scoped_per_contract() {
        let repo = repository().await;
        repo.upsert(&snapshot("c1", "shared-key", 1)).await.unwrap();
        assert!(repo.get("c2", "shared-key").await.unwrap().is_none());
    }
}
