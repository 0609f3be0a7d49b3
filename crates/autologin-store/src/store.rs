//! Credential store: per-site records encrypted at rest.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::encryption::{VaultCipher, generate_salt};
use crate::error::StoreError;

/// One website's stored credentials and login bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteCredentials {
    pub username: String,
    pub password: String,

    /// Site is known to use a third-party OAuth login.
    #[serde(default)]
    pub oauth_login: bool,

    #[serde(default)]
    pub notes: String,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_login_success: Option<bool>,
}

/// Manages secure storage and retrieval of website credentials.
///
/// The store holds one encrypted JSON blob (`credentials.enc`) and a
/// salt file (`salt.bin`) in the data directory. All mutation methods
/// persist immediately.
pub struct CredentialStore {
    credentials_path: PathBuf,
    salt_path: PathBuf,
    salt: Vec<u8>,
    cipher: Option<VaultCipher>,
    sites: HashMap<String, SiteCredentials>,
}

impl CredentialStore {
    /// Open a store in `data_dir`, creating the directory and salt
    /// file if missing. The store starts locked unless a master
    /// password is supplied.
    pub fn open(data_dir: &Path, master_password: Option<&str>) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        restrict_permissions(data_dir, 0o700)?;

        let credentials_path = data_dir.join("credentials.enc");
        let salt_path = data_dir.join("salt.bin");
        let salt = load_or_create_salt(&salt_path)?;

        let mut store = Self {
            credentials_path,
            salt_path,
            salt,
            cipher: None,
            sites: HashMap::new(),
        };

        if let Some(password) = master_password {
            store.unlock(password)?;
        }

        Ok(store)
    }

    /// Derive the cipher from the master password and load any
    /// existing credential blob. Fails on a wrong password.
    pub fn unlock(&mut self, master_password: &str) -> Result<(), StoreError> {
        let cipher = VaultCipher::from_password(master_password, &self.salt)?;

        if self.credentials_path.exists() {
            let blob = fs::read(&self.credentials_path)?;
            let plaintext = cipher.decrypt(&blob)?;
            self.sites = serde_json::from_slice(&plaintext)?;
            debug!("Loaded {} credential record(s)", self.sites.len());
        }

        self.cipher = Some(cipher);
        Ok(())
    }

    pub fn is_unlocked(&self) -> bool {
        self.cipher.is_some()
    }

    /// Change the master password, re-encrypting the stored blob with
    /// a fresh salt.
    pub fn set_master_password(&mut self, password: &str) -> Result<(), StoreError> {
        let salt = generate_salt().to_vec();
        let cipher = VaultCipher::from_password(password, &salt)?;

        fs::write(&self.salt_path, &salt)?;
        restrict_permissions(&self.salt_path, 0o600)?;

        self.salt = salt;
        self.cipher = Some(cipher);
        self.save()?;
        info!("Master password updated");
        Ok(())
    }

    /// Add or update credentials for a site.
    pub fn add(
        &mut self,
        url: &str,
        username: &str,
        password: &str,
        oauth_login: bool,
        notes: &str,
    ) -> Result<(), StoreError> {
        let existing = self.sites.get(url);
        let record = SiteCredentials {
            username: username.to_string(),
            password: password.to_string(),
            oauth_login,
            notes: notes.to_string(),
            created_at: existing.map(|c| c.created_at).unwrap_or_else(Utc::now),
            last_login: existing.and_then(|c| c.last_login),
            last_login_success: existing.and_then(|c| c.last_login_success),
        };
        self.sites.insert(url.to_string(), record);
        self.save()
    }

    /// Remove a site. Returns whether it existed.
    pub fn remove(&mut self, url: &str) -> Result<bool, StoreError> {
        let removed = self.sites.remove(url).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn get(&self, url: &str) -> Option<&SiteCredentials> {
        self.sites.get(url)
    }

    /// All stored sites, sorted by URL.
    pub fn list(&self) -> Vec<(&str, &SiteCredentials)> {
        let mut entries: Vec<_> = self
            .sites
            .iter()
            .map(|(url, creds)| (url.as_str(), creds))
            .collect();
        entries.sort_by_key(|(url, _)| *url);
        entries
    }

    /// Record the outcome of a login attempt. Unknown URLs are a
    /// no-op with a warning, not an error.
    pub fn record_login_result(&mut self, url: &str, success: bool) -> Result<(), StoreError> {
        match self.sites.get_mut(url) {
            Some(record) => {
                record.last_login = Some(Utc::now());
                record.last_login_success = Some(success);
                self.save()
            }
            None => {
                warn!("No stored credentials for {url}; login result not recorded");
                Ok(())
            }
        }
    }

    /// Drop decrypted credentials and the derived key from memory.
    pub fn clear_memory(&mut self) {
        self.sites.clear();
        self.cipher = None;
    }

    fn save(&self) -> Result<(), StoreError> {
        let cipher = self.cipher.as_ref().ok_or(StoreError::Locked)?;
        let plaintext = serde_json::to_vec(&self.sites)?;
        let blob = cipher.encrypt(&plaintext)?;
        fs::write(&self.credentials_path, blob)?;
        restrict_permissions(&self.credentials_path, 0o600)?;
        Ok(())
    }
}

fn load_or_create_salt(path: &Path) -> Result<Vec<u8>, StoreError> {
    if path.exists() {
        let salt = fs::read(path)?;
        restrict_permissions(path, 0o600)?;
        Ok(salt)
    } else {
        let salt = generate_salt();
        fs::write(path, salt)?;
        restrict_permissions(path, 0o600)?;
        Ok(salt.to_vec())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}
