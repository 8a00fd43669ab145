//! Disk persistence for collections using bincode serialization.
//!
//! Each collection is serialized to `<name>.ddb`. Writes use atomic
//! temp-file + rename to prevent corruption on crash. A CRC32 checksum is
//! appended as a footer for integrity verification.

use crate::storage::collection::{CollectionData, Database};
use crate::storage::error::StoreError;
use crate::storage::wal::{ReplayStats, SyncWriteAheadLog};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Magic bytes appended before the CRC32 footer.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"DCS1";

/// Snapshot file extension.
pub const SNAPSHOT_EXTENSION: &str = "ddb";

/// Save one collection's data with atomic write.
/// Layout: `[bincode payload][magic "DCS1"][u32 CRC32 BE]`.
pub fn save_collection(data: &CollectionData, dir: &Path) -> io::Result<()> {
    let bytes = bincode::serialize(data).map_err(|e| io::Error::other(e.to_string()))?;
    let crc = crc32fast::hash(&bytes);

    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
    }
    let path = dir.join(format!("{}.{SNAPSHOT_EXTENSION}", data.name));
    let tmp_path = dir.join(format!("{}.{SNAPSHOT_EXTENSION}.tmp", data.name));

    let mut output = Vec::with_capacity(bytes.len() + 8);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(SNAPSHOT_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    fs::write(&tmp_path, &output)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp_path, &path)?;

    tracing::info!(
        "Saved collection '{}' ({} documents, {} bytes, CRC32={:#010x})",
        data.name,
        data.documents.len(),
        bytes.len(),
        crc
    );
    Ok(())
}

/// Load a collection snapshot, verifying its CRC32 footer and invariants.
pub fn load_collection(path: &Path) -> io::Result<CollectionData> {
    let raw = fs::read(path)?;

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_CRC_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot {:?} has no checksum footer", path),
        ));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Snapshot CRC32 mismatch: expected {:#010x}, got {:#010x}. File may be corrupted: {:?}",
                stored_crc, computed_crc, path
            ),
        ));
    }

    let data: CollectionData = bincode::deserialize(payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    data.validate().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot validation failed: {}", e),
        )
    })?;

    tracing::info!(
        "Loaded collection '{}' ({} documents)",
        data.name,
        data.documents.len()
    );
    Ok(data)
}

/// Load every `.ddb` file from a directory. Unreadable snapshots are logged and skipped.
pub fn load_all_collections(dir: &Path) -> io::Result<Vec<CollectionData>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut collections = Vec::new();
    for entry in fs::read_dir(dir)? {
        let file_path = entry?.path();
        if file_path.extension().and_then(|s| s.to_str()) == Some(SNAPSHOT_EXTENSION) {
            match load_collection(&file_path) {
                Ok(data) => collections.push(data),
                Err(e) => {
                    tracing::warn!("Failed to load {:?}: {}", file_path, e);
                }
            }
        }
    }
    Ok(collections)
}

/// Snapshot every collection, then truncate the WAL if all saves succeeded.
///
/// Read locks on every collection are held for the whole pass, so no
/// mutation can slip in between the snapshot and the truncate. Returns the
/// number of collections saved.
pub fn snapshot_database(db: &Database, dir: &Path) -> io::Result<usize> {
    let collections = db.collections.read();
    let guards: Vec<_> = collections.values().map(|c| c.data.read()).collect();
    let _frozen = db.wal().map(|wal| wal.freeze());

    let mut saved = 0;
    let mut first_error = None;
    for data in &guards {
        match save_collection(data, dir) {
            Ok(()) => saved += 1,
            Err(e) => {
                tracing::error!("Failed to save collection '{}': {}", data.name, e);
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    if let Some(wal) = db.wal() {
        wal.truncate()?;
    }
    Ok(saved)
}

/// Open the database stored in `dir`: load snapshots, then replay the WAL.
pub fn open_database(dir: &Path) -> Result<(Database, ReplayStats), StoreError> {
    let wal = Arc::new(SyncWriteAheadLog::new(dir)?);
    let db = Database::with_wal(wal);
    for data in load_all_collections(dir)? {
        db.attach(data);
    }
    let stats = db.replay_wal()?;
    if stats.success > 0 || stats.skipped > 0 || stats.crc_errors > 0 {
        tracing::info!(
            success = stats.success,
            skipped = stats.skipped,
            crc_errors = stats.crc_errors,
            truncated = stats.truncated,
            "WAL replay complete"
        );
    }
    Ok((db, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, FieldValue, Fields};
    use std::path::PathBuf;
    use uuid::Uuid;

    fn tmp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("devcamper_snap_{}", Uuid::new_v4()))
    }

    fn named(name: &str) -> Document {
        let mut fields = Fields::new();
        fields.insert("name".into(), FieldValue::String(name.into()));
        Document::new(fields)
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tmp_dir();
        let db = Database::new();
        let col = db.ensure_collection("bootcamps", &["name"]).unwrap();
        let id = col.insert(named("Codemasters")).unwrap().id;

        save_collection(&col.data.read(), &dir).unwrap();
        let loaded = load_collection(&dir.join("bootcamps.ddb")).unwrap();
        assert_eq!(loaded.name, "bootcamps");
        assert_eq!(loaded.unique_fields, vec!["name".to_string()]);
        assert_eq!(
            loaded.documents[&id].fields["name"],
            FieldValue::String("Codemasters".into())
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_crc_mismatch_rejected() {
        let dir = tmp_dir();
        let db = Database::new();
        let col = db.ensure_collection("courses", &[]).unwrap();
        col.insert(named("x")).unwrap();
        save_collection(&col.data.read(), &dir).unwrap();

        let path = dir.join("courses.ddb");
        let mut raw = fs::read(&path).unwrap();
        raw[0] ^= 0xFF;
        fs::write(&path, &raw).unwrap();
        let err = load_collection(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        fs::write(&path, b"DCS").unwrap();
        assert!(load_collection(&path).is_err());
        assert!(load_all_collections(&dir).unwrap().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_open_database_snapshot_then_wal() {
        let dir = tmp_dir();
        let (snap_id, wal_id);
        {
            let (db, _) = open_database(&dir).unwrap();
            let col = db.ensure_collection("bootcamps", &["name"]).unwrap();
            snap_id = col.insert(named("In snapshot")).unwrap().id;
            assert_eq!(snapshot_database(&db, &dir).unwrap(), 1);
            assert_eq!(db.wal().unwrap().size_bytes(), 0);
            wal_id = col.insert(named("In WAL")).unwrap().id;
        }
        {
            let (db, stats) = open_database(&dir).unwrap();
            assert_eq!(stats.success, 1);
            let col = db.collection("bootcamps").unwrap();
            assert_eq!(col.document_count(), 2);
            assert!(col.get(&snap_id).is_some());
            assert!(col.get(&wal_id).is_some());
            // Constraints survive the reload.
            assert!(col.insert(named("In WAL")).is_err());
        }
        let _ = fs::remove_dir_all(&dir);
    }
}
