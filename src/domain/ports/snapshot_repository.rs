//! Snapshot repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::DraftSnapshot;

/// Key/value store of previously computed drafts.
///
/// Snapshots are keyed by `(contract_id, draft_key)` and treated as
/// immutable after creation. `upsert` is last-writer-wins: two concurrent
/// requests with the same fingerprint may both compute and both write,
/// which wastes work but never corrupts.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn get(&self, contract_id: &str, draft_key: &str) -> DomainResult<Option<DraftSnapshot>>;

    async fn upsert(&self, snapshot: &DraftSnapshot) -> DomainResult<()>;
}
