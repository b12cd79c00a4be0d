//! Structured package bundle codec.
//!
//! A structured package is a gzipped tar bundle produced by the extraction
//! pipeline. The `document.html` entry is the authoritative markup; every
//! other entry (stylesheets, media, manifests) is carried through a patch
//! untouched. All failures map to `PackageUnavailable`, which the caller
//! treats as non-fatal.

use std::io::Read;
use std::path::PathBuf;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::domain::errors::{DomainError, DomainResult};

/// Name of the authoritative markup entry.
pub const DOCUMENT_ENTRY: &str = "document.html";

fn unavailable(context: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::PackageUnavailable(format!("{context}: {err}"))
}

fn unpack_entries(bytes: &[u8]) -> DomainResult<Vec<(PathBuf, Vec<u8>)>> {
    let decoder = GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    let mut entries = Vec::new();
    for entry in archive
        .entries()
        .map_err(|e| unavailable("unreadable bundle", e))?
    {
        let mut entry = entry.map_err(|e| unavailable("corrupt bundle entry", e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| unavailable("bundle entry path", e))?
            .into_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| unavailable("bundle entry read", e))?;
        entries.push((path, data));
    }
    Ok(entries)
}

/// Index of the markup entry: an exact `document.html` wins, otherwise the
/// first `.html` entry.
fn markup_entry_index(entries: &[(PathBuf, Vec<u8>)]) -> Option<usize> {
    entries
        .iter()
        .position(|(path, _)| path.file_name().is_some_and(|n| n == DOCUMENT_ENTRY))
        .or_else(|| {
            entries
                .iter()
                .position(|(path, _)| path.extension().is_some_and(|e| e == "html"))
        })
}

/// Extract the authoritative HTML from a bundle.
pub fn read_document_html(bytes: &[u8]) -> DomainResult<String> {
    let entries = unpack_entries(bytes)?;
    let index = markup_entry_index(&entries).ok_or_else(|| {
        DomainError::PackageUnavailable("bundle has no html entry".to_string())
    })?;
    String::from_utf8(entries[index].1.clone())
        .map_err(|e| unavailable("html entry is not utf-8", e))
}

/// Rebuild a bundle with its markup entry replaced by `html`.
///
/// A bundle without a markup entry gains a `document.html`.
pub fn write_document_html(bytes: &[u8], html: &str) -> DomainResult<Vec<u8>> {
    let mut entries = unpack_entries(bytes)?;
    match markup_entry_index(&entries) {
        Some(index) => entries[index].1 = html.as_bytes().to_vec(),
        None => entries.push((PathBuf::from(DOCUMENT_ENTRY), html.as_bytes().to_vec())),
    }

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, data) in &entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, data.as_slice())
            .map_err(|e| unavailable("bundle rebuild", e))?;
    }
    let encoder = builder
        .into_inner()
        .map_err(|e| unavailable("bundle finalize", e))?;
    encoder
        .finish()
        .map_err(|e| unavailable("bundle compression", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(entries: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_reads_document_entry() {
        let bytes = bundle(&[
            ("styles.css", "p { margin: 0 }"),
            ("document.html", "<body><p>Hello</p></body>"),
        ]);
        let html = read_document_html(&bytes).unwrap();
        assert_eq!(html, "<body><p>Hello</p></body>");
    }

    #[test]
    fn test_falls_back_to_first_html_entry() {
        let bytes = bundle(&[("contract.html", "<body><p>Alt</p></body>")]);
        assert_eq!(read_document_html(&bytes).unwrap(), "<body><p>Alt</p></body>");
    }

    #[test]
    fn test_missing_html_entry_is_package_unavailable() {
        let bytes = bundle(&[("manifest.json", "{}")]);
        let err = read_document_html(&bytes).unwrap_err();
        assert!(matches!(err, DomainError::PackageUnavailable(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_garbage_bytes_are_package_unavailable() {
        let err = read_document_html(b"not a tarball").unwrap_err();
        assert!(matches!(err, DomainError::PackageUnavailable(_)));
    }

    #[test]
    fn test_replace_preserves_other_entries() {
        let bytes = bundle(&[
            ("styles.css", "p { margin: 0 }"),
            ("document.html", "<body><p>Old</p></body>"),
        ]);
        let patched = write_document_html(&bytes, "<body><p>New</p></body>").unwrap();

        assert_eq!(
            read_document_html(&patched).unwrap(),
            "<body><p>New</p></body>"
        );
        let entries = unpack_entries(&patched).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, b"p { margin: 0 }");
    }

    #[test]
    fn test_replace_adds_entry_when_missing() {
        let bytes = bundle(&[("manifest.json", "{}")]);
        let patched = write_document_html(&bytes, "<body><p>Added</p></body>").unwrap();
        assert_eq!(
            read_document_html(&patched).unwrap(),
            "<body><p>Added</p></body>"
        );
    }
}
