pub mod checksum;
pub mod guard;
pub mod snapshot;

pub use checksum::{FingerprintSet, compute_checksum, compute_fingerprint_set, member_hash};
pub use guard::{SchemaChecksumGuard, SchemaGuardConfig, ValidationOutcome};
pub use snapshot::{SNAPSHOT_FORMAT_VERSION, SchemaSnapshot, SnapshotFile, SnapshotState};
