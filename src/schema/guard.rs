use super::checksum::{FingerprintSet, compute_fingerprint_set};
use super::snapshot::{SchemaSnapshot, SnapshotFile, SnapshotState};
use crate::core::{FormError, Result};
use crate::record::TypeSet;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything a validation pass needs; no process-wide state.
#[derive(Debug, Clone, Default)]
pub struct SchemaGuardConfig {
    pub snapshot_path: Option<PathBuf>,
    pub database_name: Option<String>,
    pub tracked: TypeSet,
}

impl SchemaGuardConfig {
    pub fn new(tracked: TypeSet) -> Self {
        Self {
            tracked,
            ..Self::default()
        }
    }

    pub fn snapshot_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.snapshot_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn database_name(mut self, name: &str) -> Self {
        self.database_name = Some(name.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// No snapshot existed; one was written for the current types.
    Created,
    /// The snapshot file is empty; comparison was skipped.
    Skipped,
    /// The snapshot matches the current types.
    Matched,
}

pub struct SchemaChecksumGuard {
    config: SchemaGuardConfig,
}

impl SchemaChecksumGuard {
    pub fn new(config: SchemaGuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchemaGuardConfig {
        &self.config
    }

    /// Creates the snapshot on first run, compares against it afterwards.
    /// An existing snapshot is never rewritten.
    pub fn validate(&self) -> Result<ValidationOutcome> {
        let database = self.config.database_name.as_deref().unwrap_or("");
        if database.trim().is_empty() {
            return Err(FormError::Config("database name isn't specified".to_string()));
        }
        let snapshot_path = self
            .config
            .snapshot_path
            .as_ref()
            .ok_or_else(|| FormError::Config("schema snapshot location isn't specified".to_string()))?;
        if self.config.tracked.is_empty() {
            return Err(FormError::Config("no record types are tracked".to_string()));
        }

        let file = SnapshotFile::new(snapshot_path);
        match file.read()? {
            SnapshotState::Missing => {
                let current = compute_fingerprint_set(&self.config.tracked);
                file.create(&SchemaSnapshot::new(current))?;
                info!(
                    snapshot = %snapshot_path.display(),
                    types = self.config.tracked.len(),
                    "created schema snapshot"
                );
                Ok(ValidationOutcome::Created)
            }
            SnapshotState::Empty => {
                warn!(snapshot = %snapshot_path.display(), "schema snapshot is empty, skipping validation");
                Ok(ValidationOutcome::Skipped)
            }
            SnapshotState::Present(snapshot) => {
                let current = compute_fingerprint_set(&self.config.tracked);
                let changed = Self::diff(&snapshot.checksums, &current);
                if changed.is_empty() {
                    return Ok(ValidationOutcome::Matched);
                }
                warn!(snapshot = %snapshot_path.display(), ?changed, "schema drift detected");
                Err(FormError::SchemaDrift {
                    snapshot: snapshot_path.clone(),
                    changed,
                })
            }
        }
    }

    /// Type ids that were added, removed or changed between two sets.
    pub fn diff(persisted: &FingerprintSet, current: &FingerprintSet) -> Vec<String> {
        persisted
            .keys()
            .chain(current.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|type_id| persisted.get(*type_id) != current.get(*type_id))
            .cloned()
            .collect()
    }
}
