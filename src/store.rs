//! Encrypted Store (component E): a password-protected secret vault plus
//! per-name encrypted JSON files, and the scoped capability handles that are
//! the only way the Bridge Core or a driver ever touches either.

pub mod crypto;
pub mod files;
pub mod record;
pub mod vault;

pub use files::SecureFiles;
pub use record::{Algorithm, EncryptedRecord, Kdf, Profile};
pub use vault::{Vault, VaultMode};

use crate::error::StoreError;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use zeroize::Zeroizing;

/// A vault handle restricted to a fixed allow-list of secret ids. The Bridge
/// Core and drivers never hold a bare `Vault` — only one of these, scoped to
/// exactly the secrets that handle's owner is allowed to see.
#[derive(Clone)]
pub struct FineGrainedSecrets {
    vault: Arc<Vault>,
    allowed_ids: Arc<HashSet<String>>,
}

impl FineGrainedSecrets {
    pub fn new(vault: Arc<Vault>, allowed_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            vault,
            allowed_ids: Arc::new(allowed_ids.into_iter().collect()),
        }
    }

    pub async fn retrieve(&self, id: &str) -> Result<Zeroizing<Vec<u8>>, StoreError> {
        self.ensure_allowed(id)?;
        self.vault.retrieve(id).await
    }

    pub async fn add(&self, id: &str, secret: &[u8]) -> Result<(), StoreError> {
        self.ensure_allowed(id)?;
        self.vault.add(id, secret).await
    }

    pub async fn replace(&self, id: &str, secret: &[u8], confirm_password: &str) -> Result<(), StoreError> {
        self.ensure_allowed(id)?;
        self.vault.replace(id, secret, confirm_password).await
    }

    pub async fn delete(&self, id: &str, confirm_password: &str) -> Result<(), StoreError> {
        self.ensure_allowed(id)?;
        self.vault.delete(id, confirm_password).await
    }

    fn ensure_allowed(&self, id: &str) -> Result<(), StoreError> {
        if self.allowed_ids.contains(id) {
            Ok(())
        } else {
            Err(StoreError::NotAllowed(id.to_string()))
        }
    }
}

/// A secure-files handle restricted to a fixed allow-list of file names.
#[derive(Clone)]
pub struct FineGrainedSecureFiles {
    files: Arc<SecureFiles>,
    allowed_names: Arc<HashSet<String>>,
}

impl FineGrainedSecureFiles {
    pub fn new(files: Arc<SecureFiles>, allowed_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            files,
            allowed_names: Arc::new(allowed_names.into_iter().collect()),
        }
    }

    pub async fn read_json(&self, name: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_allowed(name)?;
        self.files.read_json(name).await
    }

    pub async fn save_json(&self, name: &str, value: &Value) -> Result<(), StoreError> {
        self.ensure_allowed(name)?;
        self.files.save_json(name, value).await
    }

    fn ensure_allowed(&self, name: &str) -> Result<(), StoreError> {
        if self.allowed_names.contains(name) {
            Ok(())
        } else {
            Err(StoreError::NotAllowed(name.to_string()))
        }
    }
}
