use super::entry::HistoryEntry;
use crate::core::{FormError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Keeps query histories between sessions, one per record type.
pub trait HistoryEntryStorage {
    fn retrieve(&self, type_id: &str) -> Result<Vec<HistoryEntry>>;
    fn store(&mut self, type_id: &str, entries: &[HistoryEntry]) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryHistoryStorage {
    histories: HashMap<String, Vec<HistoryEntry>>,
}

impl MemoryHistoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryEntryStorage for MemoryHistoryStorage {
    fn retrieve(&self, type_id: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self.histories.get(type_id).cloned().unwrap_or_default())
    }

    fn store(&mut self, type_id: &str, entries: &[HistoryEntry]) -> Result<()> {
        self.histories.insert(type_id.to_string(), entries.to_vec());
        Ok(())
    }
}

type HistoryDocument = BTreeMap<String, Vec<HistoryEntry>>;

/// All histories in one JSON document, rewritten atomically on store.
pub struct FileHistoryStorage {
    path: PathBuf,
}

impl FileHistoryStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HistoryDocument> {
        if !self.path.exists() {
            return Ok(HistoryDocument::new());
        }
        let data = fs::read(&self.path).map_err(|e| self.error("read", e))?;
        if data.is_empty() {
            return Ok(HistoryDocument::new());
        }
        serde_json::from_slice(&data).map_err(|e| self.error("parse", e))
    }

    fn save(&self, document: &HistoryDocument) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.error("create directory for", e))?;

        let serialized = serde_json::to_vec_pretty(document).map_err(|e| self.error("serialize", e))?;
        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| self.error("create temp file for", e))?;
        temp.write_all(&serialized).map_err(|e| self.error("write", e))?;
        temp.as_file().sync_all().map_err(|e| self.error("sync", e))?;
        temp.persist(&self.path).map_err(|e| self.error("persist", e.error))?;
        Ok(())
    }

    fn error(
        &self,
        action: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> FormError {
        FormError::storage(format!("{} query history '{}'", action, self.path.display()), source)
    }
}

/// Folds entries sharing a query text into the first one, keeping the
/// higher usage count and the later timestamp.
fn merge_duplicates(entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    let mut merged: Vec<HistoryEntry> = Vec::with_capacity(entries.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        match positions.get(entry.query_text()) {
            Some(&index) => {
                let kept = &merged[index];
                merged[index] = HistoryEntry::restore(
                    entry.query_text(),
                    kept.usage_count().max(entry.usage_count()),
                    kept.last_used_at().max(entry.last_used_at()),
                );
            }
            None => {
                positions.insert(entry.query_text().to_string(), merged.len());
                merged.push(entry);
            }
        }
    }
    merged
}

impl HistoryEntryStorage for FileHistoryStorage {
    fn retrieve(&self, type_id: &str) -> Result<Vec<HistoryEntry>> {
        let entries = self.load()?.remove(type_id).unwrap_or_default();
        Ok(merge_duplicates(entries))
    }

    fn store(&mut self, type_id: &str, entries: &[HistoryEntry]) -> Result<()> {
        let mut document = self.load()?;
        document.insert(type_id.to_string(), entries.to_vec());
        self.save(&document)?;
        debug!(type_id, entries = entries.len(), path = %self.path.display(), "stored query history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn entries() -> Vec<HistoryEntry> {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
        vec![
            HistoryEntry::restore("SELECT p FROM Person p", 3, at),
            HistoryEntry::restore("SELECT p FROM Person p WHERE p.name LIKE '%a%'", 1, at),
        ]
    }

    #[test]
    fn test_memory_storage() {
        let mut storage = MemoryHistoryStorage::new();
        assert!(storage.retrieve("app::Person").unwrap().is_empty());
        storage.store("app::Person", &entries()).unwrap();
        assert_eq!(storage.retrieve("app::Person").unwrap(), entries());
    }

    #[test]
    fn test_file_storage_keeps_other_types() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        let mut storage = FileHistoryStorage::new(&path);
        storage.store("app::Person", &entries()).unwrap();
        storage.store("app::Company", &entries()[..1]).unwrap();

        let reopened = FileHistoryStorage::new(&path);
        let person = reopened.retrieve("app::Person").unwrap();
        assert_eq!(person, entries());
        assert_eq!(person[0].usage_count(), 3);
        assert_eq!(reopened.retrieve("app::Company").unwrap().len(), 1);
        assert!(reopened.retrieve("app::Unknown").unwrap().is_empty());
    }

    #[test]
    fn test_file_storage_repairs_stored_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        fs::write(
            &path,
            r#"{"app::Person": [
                {"query_text": "q", "usage_count": 0, "last_used_at": "2024-01-01T00:00:00Z"},
                {"query_text": "r", "usage_count": 0, "last_used_at": "2024-01-01T00:00:00Z"},
                {"query_text": "q", "usage_count": 5, "last_used_at": "2024-01-03T00:00:00Z"}
            ]}"#,
        )
        .unwrap();

        let restored = FileHistoryStorage::new(&path).retrieve("app::Person").unwrap();
        let summary: Vec<(&str, u32)> = restored
            .iter()
            .map(|entry| (entry.query_text(), entry.usage_count()))
            .collect();
        assert_eq!(summary, vec![("q", 5), ("r", 1)]);
        assert_eq!(
            restored[0].last_used_at(),
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_file_storage_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileHistoryStorage::new(&path).retrieve("app::Person"),
            Err(FormError::Storage { .. })
        ));
    }
}
