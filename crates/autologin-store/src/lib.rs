//! # Autologin Store
//!
//! Encrypted credential storage: a PBKDF2-derived AES-256-GCM cipher
//! over a JSON blob on disk, with a salt file alongside.

mod encryption;
mod error;
mod store;

pub use encryption::VaultCipher;
pub use error::StoreError;
pub use store::{CredentialStore, SiteCredentials};
