//! Ranked, deduplicated query history.
//!
//! The free functions operate on a plain `Vec<HistoryEntry>`;
//! [`QueryHistoryStore`] bundles a history with its active ranking criterion
//! and keeps the ordering invariant after every mutation.

use super::entry::HistoryEntry;
use crate::core::{FormError, Result};
use crate::record::TypeDescriptor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingCriterion {
    #[default]
    ByUsage,
    ByRecency,
}

/// `SELECT p FROM Person p`
pub fn select_all_query(ty: &TypeDescriptor) -> String {
    let alias = ty.alias();
    format!("SELECT {alias} FROM {} {alias}", ty.simple_name)
}

/// `SELECT p FROM Person p WHERE p.name LIKE '%needle%'`
pub fn like_query(ty: &TypeDescriptor, field: &str, needle: &str) -> String {
    let alias = ty.alias();
    format!(
        "SELECT {alias} FROM {} {alias} WHERE {alias}.{field} LIKE '%{}%'",
        ty.simple_name,
        needle.replace('\'', "''")
    )
}

/// Seed history of a freshly opened query surface.
pub fn initial_history_for(ty: &TypeDescriptor) -> Vec<HistoryEntry> {
    vec![HistoryEntry::new(select_all_query(ty))]
}

/// Counts one execution of `query_text` and re-ranks `history`.
pub fn record_execution(
    history: &mut Vec<HistoryEntry>,
    query_text: &str,
    criterion: RankingCriterion,
) -> Result<HistoryEntry> {
    if query_text.trim().is_empty() {
        return Err(FormError::Query("query text must not be empty".to_string()));
    }

    let entry = match history.iter().position(|entry| entry.query_text() == query_text) {
        Some(index) => {
            let existing = &mut history[index];
            existing.touch(Utc::now());
            existing.clone()
        }
        None => {
            let created = HistoryEntry::new(query_text);
            history.push(created.clone());
            created
        }
    };
    rank(history, criterion);
    Ok(entry)
}

/// Stable ascending sort; ties keep their relative order.
pub fn rank(history: &mut [HistoryEntry], criterion: RankingCriterion) {
    match criterion {
        RankingCriterion::ByUsage => history.sort_by_key(|entry| entry.usage_count()),
        RankingCriterion::ByRecency => history.sort_by_key(|entry| entry.last_used_at()),
    }
}

pub fn contains(history: &[HistoryEntry], query_text: &str) -> bool {
    history.iter().any(|entry| entry.query_text() == query_text)
}

#[derive(Debug, Clone, Default)]
pub struct QueryHistoryStore {
    entries: Vec<HistoryEntry>,
    criterion: RankingCriterion,
}

impl QueryHistoryStore {
    pub fn new(criterion: RankingCriterion) -> Self {
        Self {
            entries: Vec::new(),
            criterion,
        }
    }

    pub fn initial_history_for(ty: &TypeDescriptor, criterion: RankingCriterion) -> Self {
        Self::with_entries(initial_history_for(ty), criterion)
    }

    /// Later duplicates of a query text are dropped.
    pub fn with_entries(entries: impl IntoIterator<Item = HistoryEntry>, criterion: RankingCriterion) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<_> = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.query_text().to_string()))
            .collect();
        rank(&mut entries, criterion);
        Self { entries, criterion }
    }

    pub fn record_execution(&mut self, query_text: &str) -> Result<HistoryEntry> {
        record_execution(&mut self.entries, query_text, self.criterion)
    }

    pub fn rank(&mut self, criterion: RankingCriterion) {
        self.criterion = criterion;
        rank(&mut self.entries, criterion);
    }

    pub fn criterion(&self) -> RankingCriterion {
        self.criterion
    }

    pub fn contains(&self, query_text: &str) -> bool {
        contains(&self.entries, query_text)
    }

    pub fn get(&self, query_text: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.query_text() == query_text)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<HistoryEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Modifier;
    use chrono::{Duration, TimeZone};

    fn person() -> TypeDescriptor {
        TypeDescriptor::new("app::Person", "Person").field("name", "String", [Modifier::Public])
    }

    fn texts(entries: &[HistoryEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.query_text()).collect()
    }

    #[test]
    fn test_select_all_shape() {
        assert_eq!(select_all_query(&person()), "SELECT p FROM Person p");
    }

    #[test]
    fn test_like_query_escapes_quotes() {
        assert_eq!(
            like_query(&person(), "name", "O'Brien"),
            "SELECT p FROM Person p WHERE p.name LIKE '%O''Brien%'"
        );
    }

    #[test]
    fn test_initial_history() {
        let history = initial_history_for(&person());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query_text(), "SELECT p FROM Person p");
        assert_eq!(history[0].usage_count(), 1);
    }

    #[test]
    fn test_record_execution_dedups() {
        let mut history = Vec::new();
        record_execution(&mut history, "SELECT x FROM X x", RankingCriterion::ByUsage).unwrap();
        let entry = record_execution(&mut history, "SELECT x FROM X x", RankingCriterion::ByUsage).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(entry.usage_count(), 2);
        assert_eq!(history[0].usage_count(), 2);
    }

    #[test]
    fn test_record_execution_rejects_blank_text() {
        let mut history = Vec::new();
        assert!(matches!(
            record_execution(&mut history, "   ", RankingCriterion::ByUsage),
            Err(FormError::Query(_))
        ));
        assert!(history.is_empty());
    }

    #[test]
    fn test_rank_by_usage_is_stable() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut history = vec![
            HistoryEntry::restore("c", 2, at),
            HistoryEntry::restore("a", 1, at),
            HistoryEntry::restore("b", 1, at),
        ];
        rank(&mut history, RankingCriterion::ByUsage);
        assert_eq!(texts(&history), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rank_by_recency() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut history = vec![
            HistoryEntry::restore("newest", 1, at + Duration::hours(2)),
            HistoryEntry::restore("oldest", 5, at),
            HistoryEntry::restore("middle", 3, at + Duration::hours(1)),
        ];
        rank(&mut history, RankingCriterion::ByRecency);
        assert_eq!(texts(&history), vec!["oldest", "middle", "newest"]);
    }

    #[test]
    fn test_store_reranks_after_mutation() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut store = QueryHistoryStore::with_entries(
            [
                HistoryEntry::restore("a", 1, at),
                HistoryEntry::restore("b", 2, at),
            ],
            RankingCriterion::ByUsage,
        );
        store.record_execution("a").unwrap();
        store.record_execution("a").unwrap();
        assert_eq!(texts(store.entries()), vec!["b", "a"]);
        assert_eq!(store.get("a").map(HistoryEntry::usage_count), Some(3));
    }

    #[test]
    fn test_store_drops_duplicate_texts() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let store = QueryHistoryStore::with_entries(
            [
                HistoryEntry::restore("a", 4, at),
                HistoryEntry::restore("a", 1, at),
            ],
            RankingCriterion::ByUsage,
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()[0].usage_count(), 4);
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
    }
}
