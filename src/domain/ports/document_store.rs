//! Document store port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::ContractDocument;

/// Read-side access to extracted contract documents.
///
/// The redlining core never writes back to this store; extraction is an
/// external collaborator that already produced plain text, markup, and a
/// structured-package reference.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a contract document by id. `None` means unknown contract,
    /// which is the one fatal condition of a compose request.
    async fn get(&self, contract_id: &str) -> DomainResult<Option<ContractDocument>>;
}
