//! Query surface for one record type: runs query texts through a
//! [`RecordStorage`] and keeps the ranked history of what was run.

use crate::core::{FormError, Result};
use crate::history::{
    HistoryEntry, HistoryEntryStorage, QueryHistoryStore, RankingCriterion, initial_history_for,
    like_query, select_all_query,
};
use crate::record::TypeDescriptor;
use crate::storage::RecordStorage;
use serde_json::Value;
use tracing::{debug, warn};

/// Result limit of the select-all query run on open.
pub const DEFAULT_QUERY_LIMIT: usize = 20;

pub struct QuerySurface<'s, S: RecordStorage + ?Sized> {
    storage: &'s S,
    record_type: TypeDescriptor,
    history: QueryHistoryStore,
    last_query: Option<(String, usize)>,
    results: Vec<Value>,
}

impl<'s, S: RecordStorage + ?Sized> QuerySurface<'s, S> {
    /// Opens with the seed history and runs the select-all query.
    pub fn open(storage: &'s S, record_type: &TypeDescriptor) -> Result<Self> {
        Self::with_history(
            storage,
            record_type,
            initial_history_for(record_type),
            RankingCriterion::default(),
        )
    }

    /// Opens with a restored history. The select-all query runs once
    /// without being counted.
    pub fn with_history(
        storage: &'s S,
        record_type: &TypeDescriptor,
        history: Vec<HistoryEntry>,
        criterion: RankingCriterion,
    ) -> Result<Self> {
        if !storage.is_record_supported(&record_type.type_id) {
            return Err(FormError::Config(format!(
                "record type '{}' is not supported by the storage",
                record_type.type_id
            )));
        }

        let query_text = select_all_query(record_type);
        let results = storage.run_query(&query_text, DEFAULT_QUERY_LIMIT)?;
        debug!(type_id = %record_type.type_id, results = results.len(), "opened query surface");

        Ok(Self {
            storage,
            record_type: record_type.clone(),
            history: QueryHistoryStore::with_entries(history, criterion),
            last_query: Some((query_text, DEFAULT_QUERY_LIMIT)),
            results,
        })
    }

    /// Opens with the history kept in `history_storage`, falling back to
    /// the seed history when none was stored.
    pub fn load<H: HistoryEntryStorage + ?Sized>(
        storage: &'s S,
        record_type: &TypeDescriptor,
        history_storage: &H,
        criterion: RankingCriterion,
    ) -> Result<Self> {
        let mut history = history_storage.retrieve(&record_type.type_id)?;
        if history.is_empty() {
            history = initial_history_for(record_type);
        }
        Self::with_history(storage, record_type, history, criterion)
    }

    pub fn save<H: HistoryEntryStorage + ?Sized>(&self, history_storage: &mut H) -> Result<()> {
        history_storage.store(&self.record_type.type_id, self.history.entries())
    }

    /// Runs `query_text`; only a successful run is recorded in the history.
    pub fn execute(&mut self, query_text: &str, limit: usize) -> Result<&[Value]> {
        if limit == 0 {
            return Err(FormError::Query("query limit must be at least 1".to_string()));
        }
        if query_text.trim().is_empty() {
            return Err(FormError::Query("enter a query".to_string()));
        }

        let results = self.storage.run_query(query_text, limit).inspect_err(|e| {
            warn!(query = query_text, error = %e, "query failed");
        })?;
        self.history.record_execution(query_text)?;
        self.last_query = Some((query_text.to_string(), limit));
        self.results = results;
        Ok(&self.results)
    }

    /// Re-runs the last query with its limit, without counting it again.
    pub fn repeat_last(&mut self) -> Result<&[Value]> {
        let (query_text, limit) = self
            .last_query
            .as_ref()
            .ok_or_else(|| FormError::Query("no query has been run".to_string()))?;
        self.results = self.storage.run_query(query_text, *limit)?;
        Ok(&self.results)
    }

    /// Looks for records whose `field` contains `needle`.
    pub fn check_value(&mut self, field: &str, needle: &str) -> Result<&[Value]> {
        let query_text = like_query(&self.record_type, field, needle);
        self.execute(&query_text, DEFAULT_QUERY_LIMIT)
    }

    pub fn rank(&mut self, criterion: RankingCriterion) {
        self.history.rank(criterion);
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn history_store(&self) -> &QueryHistoryStore {
        &self.history
    }

    pub fn results(&self) -> &[Value] {
        &self.results
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn record_type(&self) -> &TypeDescriptor {
        &self.record_type
    }
}
