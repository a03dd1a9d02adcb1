// ============================================================================
// RecordForm Library
// ============================================================================

//! Record-type introspection for form-driven persistence.
//!
//! - [`SchemaChecksumGuard`] detects drift between the record types compiled
//!   into the program and the snapshot written on the first run.
//! - [`QueryHistoryStore`] keeps a ranked, deduplicated history of the
//!   queries run against one record type.
//!
//! # Examples
//!
//! ```
//! use recordform::{Record, compute_checksum, select_all_query};
//!
//! #[derive(Record)]
//! #[allow(dead_code)]
//! struct Person {
//!     #[record(id)]
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! let person = Person::descriptor();
//! assert_eq!(person.simple_name, "Person");
//! assert_eq!(select_all_query(&person), "SELECT p FROM Person p");
//! assert_eq!(compute_checksum(&person), compute_checksum(&Person::descriptor()));
//! ```

extern crate self as recordform;

pub mod core;
pub mod history;
pub mod query;
pub mod record;
pub mod schema;
pub mod storage;

pub use core::{FormError, Result};

// Record descriptors and the derive macros producing them
pub use record::{
    Cardinality, FieldKind, FieldPlan, IdKind, MemberDescriptor, MemberKind, Modifier,
    PlannedField, Record, TypeDescriptor, TypeSet,
};
pub use recordform_derive::{Record, record_methods};

pub use schema::{
    FingerprintSet, SchemaChecksumGuard, SchemaGuardConfig, SchemaSnapshot, SnapshotFile,
    SnapshotState, ValidationOutcome, compute_checksum, compute_fingerprint_set, member_hash,
};

pub use history::{
    FileHistoryStorage, HistoryEntry, HistoryEntryStorage, MemoryHistoryStorage,
    QueryHistoryStore, RankingCriterion, initial_history_for, like_query, record_execution,
    select_all_query,
};

pub use storage::{MemoryRecordStorage, RecordStorage, StorageConf};

pub use query::{DEFAULT_QUERY_LIMIT, QuerySurface};
