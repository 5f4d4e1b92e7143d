use thiserror::Error;

/// Errors reported by both the local and the cloud store.
///
/// Absence is not an error for local reads (they return `Ok(None)`), while
/// cloud point reads report [`FomzError::NotFound`].
#[derive(Error, Debug)]
pub enum FomzError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient permissions: {0}")]
    PermissionDenied(String),

    #[error("Local storage quota exceeded, storage may be full: {0}")]
    QuotaExceeded(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FomzError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FomzError>;
