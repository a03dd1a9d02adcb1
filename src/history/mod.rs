pub mod entry;
pub mod storage;
pub mod store;

pub use entry::HistoryEntry;
pub use storage::{FileHistoryStorage, HistoryEntryStorage, MemoryHistoryStorage};
pub use store::{
    QueryHistoryStore, RankingCriterion, contains, initial_history_for, like_query, rank,
    record_execution, select_all_query,
};
