pub mod conf;
pub mod memory;
pub mod query;
pub mod record;

pub use conf::{DEFAULT_DRIVER, StorageConf};
pub use memory::MemoryRecordStorage;
pub use query::{Filter, ParsedQuery, Predicate};
pub use record::RecordStorage;
