//! Credential store errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store is locked; set the master password first")]
    Locked,

    #[error("Invalid master password")]
    InvalidMasterPassword,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
