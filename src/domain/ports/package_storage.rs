//! Structured package storage port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Blob storage for structured packages (bundles carrying the
/// authoritative HTML template of a contract).
///
/// Used in exactly two places: downloading the source package before a
/// package-based patch, and uploading the patched bundle. Failures here
/// are non-fatal; the coordinator falls back to the in-memory HTML patch.
#[async_trait]
pub trait PackageStorage: Send + Sync {
    /// Download a package by reference.
    async fn download(&self, package_ref: &str) -> DomainResult<Vec<u8>>;

    /// Upload a package and return its new reference. `ref_prefix` scopes
    /// the reference (e.g. per contract).
    async fn upload(&self, bytes: &[u8], ref_prefix: &str) -> DomainResult<String>;
}
