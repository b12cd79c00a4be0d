//! SQLite persistence adapters.

pub mod connection;
pub mod document_store;
pub mod snapshot_repository;

pub use connection::DatabaseConnection;
pub use document_store::SqliteDocumentStore;
pub use snapshot_repository::SqliteSnapshotRepository;
