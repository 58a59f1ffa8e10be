use thiserror::Error;

/// Failures raised by an [`ObjectStore`](super::ObjectStore) backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Corrupt metadata for {path}: {source}")]
    Metadata {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Failures raised by the storage mutator
///
/// Batch operations never surface per-object store failures through this type;
/// those are collected into the operation result instead.
#[derive(Error, Debug)]
pub enum MutationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl MutationError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            MutationError::InvalidInput(_) => "InvalidInput",
            MutationError::AccessDenied(_) => "AccessDenied",
            MutationError::NotFound(_) => "NotFound",
            MutationError::AlreadyExists(_) => "AlreadyExists",
            MutationError::Store(_) => "StoreError",
        }
    }
}
