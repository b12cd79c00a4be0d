//! Port traits at the system boundary, plus in-memory implementations.

pub mod document_store;
pub mod memory;
pub mod package_storage;
pub mod provider;
pub mod snapshot_repository;

pub use document_store::DocumentStore;
pub use memory::{InMemoryDocumentStore, InMemorySnapshotRepository, NullPackageStorage};
pub use package_storage::PackageStorage;
pub use provider::{CompletionRequest, GenerativeProvider, ProviderCompletion, ProviderError};
pub use snapshot_repository::SnapshotRepository;
