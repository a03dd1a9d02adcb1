use std::path::PathBuf;
use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "Schema checksums of {changed:?} don't match the snapshot in '{snapshot}'. \
         The record types changed and the persistent store must be migrated deliberately. \
         If the store is already compatible, remove '{snapshot}' and restart."
    )]
    SchemaDrift {
        snapshot: PathBuf,
        changed: Vec<String>,
    },

    #[error("Storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: BoxedCause,
    },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Unsupported field '{field}': {reason}")]
    UnsupportedField { field: String, reason: String },

    #[error("Record '{0}' not found")]
    NotFound(String),
}

impl FormError {
    pub fn storage(
        context: impl Into<String>,
        source: impl Into<BoxedCause>,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn unsupported_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for the drift failure that should abort startup.
    pub fn is_schema_drift(&self) -> bool {
        matches!(self, Self::SchemaDrift { .. })
    }
}

pub type Result<T> = std::result::Result<T, FormError>;
