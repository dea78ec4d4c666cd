//! Error type for the merge engine and its service layer.
//!
//! The pure computation in `engine`, `vector` and `weighting` cannot fail;
//! everything here originates at the signal boundary or the store boundary.

/// Result alias used across the library surface.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A signal was rejected outright (e.g. unknown `source`).
    #[error("invalid signal field `{field}`: {reason}")]
    Validation { field: String, reason: String },

    /// Every read-merge-write attempt lost the race to a concurrent writer.
    #[error("profile {entity_id} still conflicting after {attempts} attempts")]
    Conflict { entity_id: String, attempts: u32 },

    /// De-duplication is enabled and this `source_id` was already merged.
    #[error("signal {source_id} already merged into profile {entity_id}")]
    Duplicate { entity_id: String, source_id: String },

    /// The backing store failed for a reason other than a version mismatch.
    #[error("profile store error: {0}")]
    Store(String),
}

impl EngineError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short, stable label used in HTTP bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Conflict { .. } => "conflict",
            Self::Duplicate { .. } => "duplicate",
            Self::Store(_) => "store",
        }
    }
}
