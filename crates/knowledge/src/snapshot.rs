//! On-disk persistence of the index.
//!
//! A snapshot is two files in the index directory:
//!
//! - `vectors.bin`: the [`FlatIndex`] blob
//! - `meta.json`: `{metas, texts, next_uid, vectors_sha256, saved_at}`
//!
//! Both are written to temporary files and renamed into place. The SHA-256
//! of the vector blob is recorded in the metadata, so a pair that did not
//! come from the same save is rejected on load.

use crate::config::{META_FILE, VECTORS_FILE};
use crate::types::ChunkMeta;
use crate::vector_index::FlatIndex;
use chrono::{DateTime, Utc};
use ragdex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Contents of a snapshot after a successful load.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: FlatIndex,
    pub metas: Vec<ChunkMeta>,
    pub texts: Vec<String>,
    pub next_uid: u64,
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct MetaDocumentRef<'a> {
    metas: &'a [ChunkMeta],
    texts: &'a [String],
    next_uid: u64,
    vectors_sha256: String,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct MetaDocument {
    metas: Vec<ChunkMeta>,
    texts: Vec<String>,
    #[serde(default)]
    next_uid: u64,
    #[serde(default)]
    vectors_sha256: Option<String>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn write_atomic(path: &Path, contents: &[u8]) -> AppResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Persist the index, metadata and texts into `index_dir`.
pub fn save(
    index_dir: &Path,
    index: &FlatIndex,
    metas: &[ChunkMeta],
    texts: &[String],
    next_uid: u64,
) -> AppResult<()> {
    if metas.len() != texts.len() || metas.len() != index.len() {
        return Err(AppError::Other(format!(
            "refusing to save misaligned snapshot: {} vectors, {} metas, {} texts",
            index.len(),
            metas.len(),
            texts.len()
        )));
    }

    fs::create_dir_all(index_dir)?;

    let blob = index.to_bytes();
    let document = MetaDocumentRef {
        metas,
        texts,
        next_uid,
        vectors_sha256: sha256_hex(&blob),
        saved_at: Utc::now(),
    };
    let json = serde_json::to_vec_pretty(&document)?;

    write_atomic(&index_dir.join(VECTORS_FILE), &blob)?;
    write_atomic(&index_dir.join(META_FILE), &json)?;

    debug!(
        chunks = metas.len(),
        next_uid,
        "Saved snapshot to {}",
        index_dir.display()
    );
    Ok(())
}

/// Load the snapshot in `index_dir`.
///
/// Returns `Ok(None)` when neither file exists. Anything else that is not a
/// consistent pair is [`AppError::SnapshotCorrupt`].
pub fn load(index_dir: &Path) -> AppResult<Option<Snapshot>> {
    let vectors_path = index_dir.join(VECTORS_FILE);
    let meta_path = index_dir.join(META_FILE);

    let blob = match fs::read(&vectors_path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let json = match fs::read(&meta_path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let (blob, json) = match (blob, json) {
        (None, None) => return Ok(None),
        (Some(blob), Some(json)) => (blob, json),
        (Some(_), None) => {
            return Err(AppError::SnapshotCorrupt(format!(
                "{} is missing",
                meta_path.display()
            )))
        }
        (None, Some(_)) => {
            return Err(AppError::SnapshotCorrupt(format!(
                "{} is missing",
                vectors_path.display()
            )))
        }
    };

    let document: MetaDocument = serde_json::from_slice(&json)
        .map_err(|e| AppError::SnapshotCorrupt(format!("{}: {}", meta_path.display(), e)))?;

    if let Some(expected) = &document.vectors_sha256 {
        let actual = sha256_hex(&blob);
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(AppError::SnapshotCorrupt(
                "vector file does not match metadata digest".to_string(),
            ));
        }
    }

    let index = FlatIndex::from_bytes(&blob)?;

    if document.metas.len() != document.texts.len() || document.metas.len() != index.len() {
        return Err(AppError::SnapshotCorrupt(format!(
            "misaligned snapshot: {} vectors, {} metas, {} texts",
            index.len(),
            document.metas.len(),
            document.texts.len()
        )));
    }

    let max_uid = document.metas.iter().map(|m| m.uid + 1).max().unwrap_or(0);
    let next_uid = document.next_uid.max(max_uid);

    info!(
        chunks = document.metas.len(),
        next_uid,
        "Loaded snapshot from {}",
        index_dir.display()
    );

    Ok(Some(Snapshot {
        index,
        metas: document.metas,
        texts: document.texts,
        next_uid,
        saved_at: document.saved_at,
    }))
}

/// Delete both snapshot files. Missing files are not an error.
pub fn remove(index_dir: &Path) -> AppResult<()> {
    for name in [VECTORS_FILE, META_FILE] {
        match fs::remove_file(index_dir.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample() -> (FlatIndex, Vec<ChunkMeta>, Vec<String>) {
        let mut index = FlatIndex::new(2);
        index.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let metas = vec![
            ChunkMeta {
                uid: 3,
                source: "a.txt".to_string(),
                chunk_index: 0,
                path: PathBuf::from("/docs/a.txt"),
            },
            ChunkMeta {
                uid: 4,
                source: "a.txt".to_string(),
                chunk_index: 1,
                path: PathBuf::from("/docs/a.txt"),
            },
        ];
        let texts = vec!["first".to_string(), "second".to_string()];
        (index, metas, texts)
    }

    #[test]
    fn test_missing_snapshot_loads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let (index, metas, texts) = sample();

        save(dir.path(), &index, &metas, &texts, 10).unwrap();
        let snapshot = load(dir.path()).unwrap().unwrap();

        assert_eq!(snapshot.index, index);
        assert_eq!(snapshot.metas, metas);
        assert_eq!(snapshot.texts, texts);
        assert_eq!(snapshot.next_uid, 10);
        assert!(snapshot.saved_at.is_some());
        assert!(!dir.path().join("meta.json.tmp").exists());
    }

    #[test]
    fn test_next_uid_never_below_live_uids() {
        let dir = TempDir::new().unwrap();
        let (index, metas, texts) = sample();

        save(dir.path(), &index, &metas, &texts, 0).unwrap();
        assert_eq!(load(dir.path()).unwrap().unwrap().next_uid, 5);
    }

    #[test]
    fn test_refuses_misaligned_save() {
        let dir = TempDir::new().unwrap();
        let (index, metas, _) = sample();

        assert!(save(dir.path(), &index, &metas, &["only one".to_string()], 5).is_err());
        assert!(!dir.path().join(VECTORS_FILE).exists());
    }

    #[test]
    fn test_digest_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let (index, metas, texts) = sample();
        save(dir.path(), &index, &metas, &texts, 5).unwrap();

        let mut other = FlatIndex::new(2);
        other.add(&[vec![0.6, 0.8], vec![0.8, 0.6]]).unwrap();
        fs::write(dir.path().join(VECTORS_FILE), other.to_bytes()).unwrap();

        assert!(matches!(
            load(dir.path()),
            Err(AppError::SnapshotCorrupt(_))
        ));
    }

    #[test]
    fn test_half_a_pair_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let (index, metas, texts) = sample();
        save(dir.path(), &index, &metas, &texts, 5).unwrap();
        fs::remove_file(dir.path().join(META_FILE)).unwrap();

        assert!(matches!(
            load(dir.path()),
            Err(AppError::SnapshotCorrupt(_))
        ));
    }

    #[test]
    fn test_legacy_metadata_without_digest() {
        let dir = TempDir::new().unwrap();
        let (index, _, _) = sample();
        fs::write(dir.path().join(VECTORS_FILE), index.to_bytes()).unwrap();
        fs::write(
            dir.path().join(META_FILE),
            r#"{
                "metas": [
                    {"uid": 0, "source": "a.txt", "chunk_id": 0, "path": "/docs/a.txt"},
                    {"uid": 1, "source": "a.txt", "chunk_id": 1, "path": "/docs/a.txt"}
                ],
                "texts": ["first", "second"]
            }"#,
        )
        .unwrap();

        let snapshot = load(dir.path()).unwrap().unwrap();
        assert_eq!(snapshot.metas[1].chunk_index, 1);
        assert_eq!(snapshot.next_uid, 2);
        assert!(snapshot.saved_at.is_none());
    }

    #[test]
    fn test_garbage_metadata_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let (index, _, _) = sample();
        fs::write(dir.path().join(VECTORS_FILE), index.to_bytes()).unwrap();
        fs::write(dir.path().join(META_FILE), "{not json").unwrap();

        assert!(matches!(
            load(dir.path()),
            Err(AppError::SnapshotCorrupt(_))
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (index, metas, texts) = sample();
        save(dir.path(), &index, &metas, &texts, 5).unwrap();

        remove(dir.path()).unwrap();
        remove(dir.path()).unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }
}
