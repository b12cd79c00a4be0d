//! In-memory port implementations.
//!
//! Used by tests and by storage-less runs where persisting snapshots is
//! not wanted but the type system requires the port.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ContractDocument, DraftSnapshot};
use super::{DocumentStore, PackageStorage, SnapshotRepository};

/// Map-backed document store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<String, ContractDocument>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, replacing any previous version.
    pub async fn insert(&self, document: ContractDocument) {
        self.documents
            .write()
            .await
            .insert(document.contract_id.clone(), document);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, contract_id: &str) -> DomainResult<Option<ContractDocument>> {
        Ok(self.documents.read().await.get(contract_id).cloned())
    }
}

/// Map-backed snapshot repository with last-writer-wins upsert.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotRepository {
    snapshots: Arc<RwLock<HashMap<(String, String), DraftSnapshot>>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn get(&self, contract_id: &str, draft_key: &str) -> DomainResult<Option<DraftSnapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&(contract_id.to_string(), draft_key.to_string()))
            .cloned())
    }

    async fn upsert(&self, snapshot: &DraftSnapshot) -> DomainResult<()> {
        self.snapshots.write().await.insert(
            (snapshot.contract_id.clone(), snapshot.draft_key.clone()),
            snapshot.clone(),
        );
        Ok(())
    }
}

/// A package storage that has nothing.
///
/// Every download reports `PackageUnavailable`, which the coordinator
/// treats as "patch the in-memory HTML instead".
#[derive(Debug, Clone, Default)]
pub struct NullPackageStorage;

impl NullPackageStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PackageStorage for NullPackageStorage {
    async fn download(&self, package_ref: &str) -> DomainResult<Vec<u8>> {
        Err(DomainError::PackageUnavailable(format!(
            "no package storage configured (ref {package_ref})"
        )))
    }

    async fn upload(&self, _bytes: &[u8], ref_prefix: &str) -> DomainResult<String> {
        Err(DomainError::PackageUnavailable(format!(
            "no package storage configured (prefix {ref_prefix})"
        )))
    }
}
