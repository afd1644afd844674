//! Blob persistence for the dependency index.
//!
//! The on-disk format is a small header (magic plus format version) followed
//! by the MessagePack payload. Writes go to a temp file in the target
//! directory and rename into place so readers never observe a torn blob.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::index::DependencyIndex;

const MAGIC: &[u8; 4] = b"DIDX";
const FORMAT_VERSION: u32 = 1;

/// Serialize the index and atomically replace the blob at `path`.
///
/// Returns the number of bytes written.
pub fn save(index: &DependencyIndex, path: &Path) -> Result<u64> {
    let payload = rmp_serde::to_vec(index)?;

    let mut blob = Vec::with_capacity(payload.len() + 8);
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    blob.extend_from_slice(&payload);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&blob)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    tracing::debug!("wrote index blob to {} ({} bytes)", path.display(), blob.len());
    Ok(blob.len() as u64)
}

/// Load a blob written by [`save`], verifying the header before decoding.
pub fn load(path: &Path) -> Result<DependencyIndex> {
    let blob = fs::read(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    if blob.len() < 8 || &blob[..4] != MAGIC {
        return Err(Error::BlobFormat {
            path: path.to_path_buf(),
        });
    }

    let version = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]);
    if version != FORMAT_VERSION {
        return Err(Error::BlobVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let mut index: DependencyIndex = rmp_serde::from_slice(&blob[8..])?;
    index.rebuild_lookups();
    Ok(index)
}

/// Whether a readable blob exists at `path` without decoding the payload.
pub fn exists(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Document;
    use crate::types::AssetId;

    fn id(hex: &str) -> AssetId {
        AssetId::from_hex(hex).unwrap()
    }

    fn sample_index() -> DependencyIndex {
        let mut index = DependencyIndex::new();
        let doc = index.add_document(Document {
            id: id("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            path: Some("assets/rock.mat".to_string()),
            extension: Some("mat".to_string()),
            is_folder: false,
            is_package: false,
        });
        index.add_exact_word("all", doc);
        index.add_property("t", "mat", doc);
        index.add_number("in", 3, doc);
        index.add_metadata(doc, "Referred by assets/scene.unity".to_string());
        index
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store/dependencies.idx");

        let index = sample_index();
        let bytes = save(&index, &path).unwrap();
        assert!(bytes > 8);
        assert!(exists(&path));

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);

        // The skipped lookup map is rebuilt on load.
        let doc = loaded.doc_id(&id("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")).unwrap();
        assert!(loaded.property_docs("t", "mat").unwrap().contains(&doc));
        assert_eq!(loaded.metadata(doc), ["Referred by assets/scene.unity"]);
    }

    #[test]
    fn test_save_replaces_existing_blob() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dependencies.idx");

        save(&sample_index(), &path).unwrap();

        let mut bigger = sample_index();
        let doc = bigger.add_document(Document {
            id: id("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
            path: Some("assets/two.mat".to_string()),
            extension: Some("mat".to_string()),
            is_folder: false,
            is_package: false,
        });
        bigger.add_exact_word("all", doc);
        save(&bigger, &path).unwrap();

        assert_eq!(load(&path).unwrap().len(), 2);
        // No leftover temp file.
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dependencies.idx");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00payload").unwrap();

        assert!(matches!(load(&path), Err(Error::BlobFormat { .. })));
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dependencies.idx");
        std::fs::write(&path, b"DID").unwrap();

        assert!(matches!(load(&path), Err(Error::BlobFormat { .. })));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dependencies.idx");

        let mut blob = Vec::new();
        blob.extend_from_slice(b"DIDX");
        blob.extend_from_slice(&99u32.to_le_bytes());
        std::fs::write(&path, &blob).unwrap();

        match load(&path) {
            Err(Error::BlobVersion { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.idx");
        assert!(!exists(&path));
        assert!(matches!(load(&path), Err(Error::FileRead { .. })));
    }
}
