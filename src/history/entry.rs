use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// One previously executed query. Identity is the query text alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoredEntry")]
pub struct HistoryEntry {
    query_text: String,
    usage_count: u32,
    last_used_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self::restore(query_text, 1, Utc::now())
    }

    /// Rebuilds an entry from stored values; the usage count is at least 1.
    pub fn restore(query_text: impl Into<String>, usage_count: u32, last_used_at: DateTime<Utc>) -> Self {
        Self {
            query_text: query_text.into(),
            usage_count: usage_count.max(1),
            last_used_at,
        }
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    pub fn last_used_at(&self) -> DateTime<Utc> {
        self.last_used_at
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used_at = at;
    }
}

/// Serialized shape of [`HistoryEntry`]; decoding goes through `restore`.
#[derive(Deserialize)]
struct StoredEntry {
    query_text: String,
    usage_count: u32,
    last_used_at: DateTime<Utc>,
}

impl From<StoredEntry> for HistoryEntry {
    fn from(stored: StoredEntry) -> Self {
        Self::restore(stored.query_text, stored.usage_count, stored.last_used_at)
    }
}

impl PartialEq for HistoryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.query_text == other.query_text
    }
}

impl Eq for HistoryEntry {}

impl Hash for HistoryEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query_text.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_equality_by_text_only() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = HistoryEntry::restore("SELECT p FROM Person p", 1, at);
        let b = HistoryEntry::restore("SELECT p FROM Person p", 9, Utc::now());
        assert_eq!(a, b);
        assert_ne!(a, HistoryEntry::restore("SELECT c FROM Company c", 1, at));
    }

    #[test]
    fn test_restore_clamps_usage() {
        assert_eq!(HistoryEntry::restore("q", 0, Utc::now()).usage_count(), 1);
    }

    #[test]
    fn test_decoding_clamps_usage() {
        let entry: HistoryEntry = serde_json::from_str(
            r#"{"query_text": "q", "usage_count": 0, "last_used_at": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(entry.usage_count(), 1);
    }

    #[test]
    fn test_touch_increments_and_refreshes() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut entry = HistoryEntry::restore("q", 3, at);
        entry.touch(later);
        assert_eq!(entry.usage_count(), 4);
        assert_eq!(entry.last_used_at(), later);
    }
}
