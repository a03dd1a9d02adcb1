use super::conf::StorageConf;
use crate::core::Result;
use serde_json::Value;

/// Record storage trait - allows pluggable persistence backends
///
/// Records are JSON objects keyed by the id field of their record type.
pub trait RecordStorage: Send + Sync {
    /// Persist a new record; an already stored id is an error
    ///
    /// A missing or null id is assigned by the storage. Returns the
    /// record as stored.
    fn store(&mut self, type_id: &str, record: Value) -> Result<Value>;

    /// Merge a record into storage, inserting it when its id is unknown
    fn update(&mut self, type_id: &str, record: Value) -> Result<Value>;

    /// Remove the stored record with the id of `record`
    fn delete(&mut self, type_id: &str, record: &Value) -> Result<()>;

    /// Look a record up by id
    fn retrieve(&self, type_id: &str, id: &Value) -> Result<Option<Value>>;

    /// Run a query text, returning at most `limit` records
    fn run_query(&self, query_text: &str, limit: usize) -> Result<Vec<Value>>;

    /// All records whose `attribute` equals `value`
    fn run_query_by_attribute(&self, type_id: &str, attribute: &str, value: &str) -> Result<Vec<Value>>;

    fn run_query_all(&self, type_id: &str) -> Result<Vec<Value>>;

    /// Whether records of `type_id` can be stored
    fn is_record_supported(&self, type_id: &str) -> bool;

    fn storage_conf(&self) -> &StorageConf;

    /// Release the storage; later calls fail
    fn shutdown(&mut self);
}
