use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("failed to acquire lock for {}: timed out after {:?}", .path.display(), .timeout)]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("{} is currently locked", .0.display())]
    AlreadyLocked(PathBuf),

    #[error("lock already released")]
    LockReleased,

    #[error("MCP not found: {0}")]
    McpNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unsupported inventory version: {0}")]
    UnsupportedVersion(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, InventoryError>;
