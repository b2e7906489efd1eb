//! Content-addressed row heap
//!
//! Each row lives in its own file under a two-level shard directory
//! derived from its [`HeapId`]. Heap files are written once; an update
//! is a delete plus a fresh write under a new id, driven by the table.
//! Empty shard directories are left in place after deletes.

use std::fs;
use std::path::Path;

use tracing::trace;

use super::packer;
use crate::error::Result;
use crate::types::{HeapId, Value};

/// Persist a row under a freshly generated id, retrying generation
/// until the target path is unused. Returns the id.
pub fn write(root: &Path, values: &[Value]) -> Result<HeapId> {
    let (heap_id, path) = loop {
        let candidate = HeapId::generate();
        let path = root.join(candidate.to_path());
        if !path.exists() {
            break (candidate, path);
        }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, packer::pack_row(values))?;
    trace!(heap_id = %heap_id, "heap write");

    Ok(heap_id)
}

/// Read a row back, or `None` when no blob exists under the id.
pub fn read(root: &Path, heap_id: HeapId) -> Result<Option<Vec<Value>>> {
    let path = root.join(heap_id.to_path());
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(&path)?;
    Ok(Some(packer::unpack_row(&data)?))
}

/// Remove a row, returning its content when it existed. The shard
/// directories are not reclaimed.
pub fn delete(root: &Path, heap_id: HeapId) -> Result<Option<Vec<Value>>> {
    let path = root.join(heap_id.to_path());
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(&path)?;
    let values = packer::unpack_row(&data)?;
    fs::remove_file(&path)?;
    trace!(heap_id = %heap_id, "heap delete");
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;
    use tempfile::TempDir;

    fn sample_row() -> Vec<Value> {
        vec![Value::int(1), Value::text("bob"), Value::null(ValueType::Bool)]
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let row = sample_row();

        let id = write(dir.path(), &row).unwrap();
        assert_eq!(read(dir.path(), id).unwrap(), Some(row));
    }

    #[test]
    fn test_read_missing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read(dir.path(), HeapId::new(0xDEAD)).unwrap(), None);
    }

    #[test]
    fn test_delete_returns_content_once() {
        let dir = TempDir::new().unwrap();
        let row = sample_row();

        let id = write(dir.path(), &row).unwrap();
        assert_eq!(delete(dir.path(), id).unwrap(), Some(row));
        assert_eq!(delete(dir.path(), id).unwrap(), None);
        assert_eq!(read(dir.path(), id).unwrap(), None);
    }

    #[test]
    fn test_shard_directories_survive_delete() {
        let dir = TempDir::new().unwrap();
        let id = write(dir.path(), &sample_row()).unwrap();

        let shard = dir.path().join(id.to_path()).parent().unwrap().to_path_buf();
        delete(dir.path(), id).unwrap();
        assert!(shard.exists());
    }

    #[test]
    fn test_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), &sample_row()).unwrap();
        let b = write(dir.path(), &sample_row()).unwrap();
        assert_ne!(a, b);
        assert!(read(dir.path(), a).unwrap().is_some());
        assert!(read(dir.path(), b).unwrap().is_some());
    }
}
