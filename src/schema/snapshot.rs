use super::checksum::FingerprintSet;
use crate::core::{FormError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub version: u32,
    pub checksums: FingerprintSet,
}

impl SchemaSnapshot {
    pub fn new(checksums: FingerprintSet) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            checksums,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SnapshotState {
    Missing,
    /// Zero-length file: the operator opted out of the check.
    Empty,
    Present(SchemaSnapshot),
}

/// Write-once snapshot file.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn read(&self) -> Result<SnapshotState> {
        if !self.path.exists() {
            return Ok(SnapshotState::Missing);
        }
        let mut file = File::open(&self.path).map_err(|e| self.error("open", e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|e| self.error("read", e))?;
        if data.is_empty() {
            return Ok(SnapshotState::Empty);
        }
        let snapshot: SchemaSnapshot =
            rmp_serde::from_slice(&data).map_err(|e| self.error("deserialize", e))?;
        if snapshot.version != SNAPSHOT_FORMAT_VERSION {
            return Err(self.error(
                "check version of",
                format!(
                    "unsupported snapshot format version {} (expected {})",
                    snapshot.version, SNAPSHOT_FORMAT_VERSION
                ),
            ));
        }
        Ok(SnapshotState::Present(snapshot))
    }

    /// Writes `snapshot` atomically. Fails if the file already exists.
    pub fn create(&self, snapshot: &SchemaSnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.error("create directory for", e))?;

        let serialized = rmp_serde::to_vec_named(snapshot).map_err(|e| self.error("serialize", e))?;
        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| self.error("create temp file for", e))?;
        temp.write_all(&serialized).map_err(|e| self.error("write", e))?;
        temp.flush().map_err(|e| self.error("flush", e))?;
        temp.as_file().sync_all().map_err(|e| self.error("sync", e))?;
        temp.persist_noclobber(&self.path)
            .map_err(|e| self.error("persist", e.error))?;
        Ok(())
    }

    fn error(
        &self,
        action: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> FormError {
        FormError::storage(format!("{} snapshot '{}'", action, self.path.display()), source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> SchemaSnapshot {
        let mut checksums = FingerprintSet::new();
        checksums.insert("app::Person".to_string(), -42);
        checksums.insert("app::Company".to_string(), 7);
        SchemaSnapshot::new(checksums)
    }

    #[test]
    fn test_missing_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(temp_dir.path().join("scheme.checksum"));
        assert_eq!(file.read().unwrap(), SnapshotState::Missing);
    }

    #[test]
    fn test_create_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(temp_dir.path().join("nested/scheme.checksum"));
        file.create(&sample()).unwrap();
        assert!(file.exists());
        assert_eq!(file.read().unwrap(), SnapshotState::Present(sample()));
    }

    #[test]
    fn test_create_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scheme.checksum");
        fs::write(&path, b"keep").unwrap();
        let file = SnapshotFile::new(&path);
        assert!(matches!(file.create(&sample()), Err(FormError::Storage { .. })));
        assert_eq!(fs::read(&path).unwrap(), b"keep");
    }

    #[test]
    fn test_zero_length_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scheme.checksum");
        File::create(&path).unwrap();
        assert_eq!(SnapshotFile::new(&path).read().unwrap(), SnapshotState::Empty);
    }

    #[test]
    fn test_garbage_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scheme.checksum");
        fs::write(&path, [0xc1, 0x00, 0xff]).unwrap();
        assert!(matches!(
            SnapshotFile::new(&path).read(),
            Err(FormError::Storage { .. })
        ));
    }
}
