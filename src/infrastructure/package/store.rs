//! Filesystem-backed package storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::PackageStorage;

/// Stores structured package bundles as files under a root directory.
///
/// References are root-relative paths, e.g. `c-42/d1f3….tar.gz`. The store
/// never deletes; patched bundles get fresh references.
pub struct FsPackageStorage {
    root: PathBuf,
}

impl FsPackageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a reference inside the root, rejecting path traversal.
    fn resolve(&self, package_ref: &str) -> DomainResult<PathBuf> {
        let relative = Path::new(package_ref);
        let escapes = relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes {
            return Err(DomainError::PackageUnavailable(format!(
                "invalid package reference: {package_ref}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl PackageStorage for FsPackageStorage {
    async fn download(&self, package_ref: &str) -> DomainResult<Vec<u8>> {
        let path = self.resolve(package_ref)?;
        fs::read(&path).await.map_err(|e| {
            DomainError::PackageUnavailable(format!("read {}: {e}", path.display()))
        })
    }

    async fn upload(&self, bytes: &[u8], ref_prefix: &str) -> DomainResult<String> {
        let package_ref = format!("{ref_prefix}/{}.tar.gz", Uuid::new_v4());
        let path = self.resolve(&package_ref)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::PackageUnavailable(format!("mkdir {}: {e}", parent.display()))
            })?;
        }
        fs::write(&path, bytes).await.map_err(|e| {
            DomainError::PackageUnavailable(format!("write {}: {e}", path.display()))
        })?;
        debug!(package_ref = %package_ref, bytes = bytes.len(), "package uploaded");
        Ok(package_ref)
    }
}
