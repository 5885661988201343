//! The password-protected secret vault: one encrypted record per secret,
//! guarded by a single writer lock since concurrent mutation of the same
//! on-disk file has no sane merge semantics.

use super::crypto;
use super::record::{Algorithm, EncryptedRecord, Kdf, Profile};
use crate::error::StoreError;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

/// Every vault carries a `test` record, never itself a real secret. It
/// exists purely so a caller can cheaply verify a candidate password
/// without touching any real secret.
const TEST_KEY: &str = "test";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VaultMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl VaultMode {
    fn can_read(self) -> bool {
        !matches!(self, VaultMode::WriteOnly)
    }

    fn can_write(self) -> bool {
        !matches!(self, VaultMode::ReadOnly)
    }
}

struct Inner {
    password: Zeroizing<String>,
    data: HashMap<String, EncryptedRecord>,
    /// Identifiers allowed exactly one successful `retrieve` for this
    /// process lifetime. Not persisted: a restart resets the budget.
    one_time: HashSet<String>,
    accessed: HashSet<String>,
}

pub struct Vault {
    path: PathBuf,
    mode: VaultMode,
    inner: Mutex<Inner>,
}

impl Vault {
    pub async fn open(
        path: PathBuf,
        password: impl Into<String>,
        mode: VaultMode,
        one_time: impl IntoIterator<Item = String>,
    ) -> Result<Self, StoreError> {
        let password = Zeroizing::new(password.into());
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|error| StoreError::CorruptRecord(format!("invalid vault file: {error}")))?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(error) => return Err(StoreError::Other(error.into())),
        };

        let vault = Self {
            path,
            mode,
            inner: Mutex::new(Inner {
                password,
                data,
                one_time: one_time.into_iter().collect(),
                accessed: HashSet::new(),
            }),
        };
        vault.ensure_test_record().await?;
        Ok(vault)
    }

    async fn ensure_test_record(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.data.contains_key(TEST_KEY) {
            return Ok(());
        }
        let sentinel: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let record = crypto::encrypt(
            sentinel.as_bytes(),
            inner.password.as_bytes(),
            Algorithm::XChaCha20Poly1305,
            Kdf::Argon2,
            Profile::Argon2Low,
        )?;
        inner.data.insert(TEST_KEY.to_string(), record);
        self.persist(&inner.data).await
    }

    /// Cheaply verifies a candidate password against the `test` record
    /// without touching any real secret.
    pub async fn test_password(&self, password: &str) -> bool {
        let inner = self.inner.lock().await;
        let Some(record) = inner.data.get(TEST_KEY) else {
            return false;
        };
        crypto::decrypt(record, password.as_bytes()).is_ok()
    }

    pub async fn needs_reencryption(&self) -> bool {
        let inner = self.inner.lock().await;
        inner
            .data
            .get(TEST_KEY)
            .map(|record| record.profile().is_outdated())
            .unwrap_or(false)
    }

    pub async fn list_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.data.keys().filter(|id| id.as_str() != TEST_KEY).cloned().collect()
    }

    pub async fn retrieve(&self, id: &str) -> Result<Zeroizing<Vec<u8>>, StoreError> {
        if !self.mode.can_read() {
            return Err(StoreError::ReadOnly);
        }

        let mut inner = self.inner.lock().await;
        if inner.one_time.contains(id) {
            if inner.accessed.contains(id) {
                return Err(StoreError::AlreadyRetrieved(id.to_string()));
            }
            inner.accessed.insert(id.to_string());
        }

        let record = inner
            .data
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let decrypted = crypto::decrypt(record, inner.password.as_bytes())?;
        Ok(Zeroizing::new(decrypted.plaintext))
    }

    pub async fn add(&self, id: &str, secret: &[u8]) -> Result<(), StoreError> {
        if !self.mode.can_write() {
            return Err(StoreError::ReadOnly);
        }
        let mut inner = self.inner.lock().await;
        if inner.data.contains_key(id) {
            return Err(StoreError::NotAllowed(format!("secret {id} already exists")));
        }
        let record = crypto::encrypt(
            secret,
            inner.password.as_bytes(),
            Algorithm::XChaCha20Poly1305,
            Kdf::Argon2,
            Profile::Argon2Low,
        )?;
        inner.data.insert(id.to_string(), record);
        self.persist(&inner.data).await
    }

    pub async fn replace(&self, id: &str, secret: &[u8], confirm_password: &str) -> Result<(), StoreError> {
        self.guard_mutation(id, confirm_password).await?;
        let mut inner = self.inner.lock().await;
        let record = crypto::encrypt(
            secret,
            inner.password.as_bytes(),
            Algorithm::XChaCha20Poly1305,
            Kdf::Argon2,
            Profile::Argon2Low,
        )?;
        inner.data.insert(id.to_string(), record);
        self.persist(&inner.data).await
    }

    pub async fn delete(&self, id: &str, confirm_password: &str) -> Result<(), StoreError> {
        self.guard_mutation(id, confirm_password).await?;
        let mut inner = self.inner.lock().await;
        inner.data.remove(id);
        self.persist(&inner.data).await
    }

    async fn guard_mutation(&self, id: &str, confirm_password: &str) -> Result<(), StoreError> {
        if !self.mode.can_write() {
            return Err(StoreError::ReadOnly);
        }
        if id == TEST_KEY {
            return Err(StoreError::NotAllowed("the test record cannot be modified".to_string()));
        }
        if !self.test_password(confirm_password).await {
            return Err(StoreError::BadPassword);
        }
        let inner = self.inner.lock().await;
        if !inner.data.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Decrypts every record under the current password and re-encrypts it
    /// under `new_password`, then swaps the vault's working password.
    pub async fn reencrypt(&self, current_password: &str, new_password: &str) -> Result<(), StoreError> {
        if !self.mode.can_write() {
            return Err(StoreError::ReadOnly);
        }
        if !self.test_password(current_password).await {
            return Err(StoreError::BadPassword);
        }

        let mut inner = self.inner.lock().await;
        let mut rewritten = HashMap::with_capacity(inner.data.len());
        for (id, record) in inner.data.iter() {
            let decrypted = crypto::decrypt(record, current_password.as_bytes())?;
            let fresh = crypto::encrypt(
                &decrypted.plaintext,
                new_password.as_bytes(),
                Algorithm::XChaCha20Poly1305,
                Kdf::Argon2,
                Profile::Argon2Low,
            )?;
            rewritten.insert(id.clone(), fresh);
        }
        inner.data = rewritten;
        inner.password = Zeroizing::new(new_password.to_string());
        self.persist(&inner.data).await
    }

    async fn persist(&self, data: &HashMap<String, EncryptedRecord>) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(data).map_err(|error| StoreError::Other(error.into()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| StoreError::Other(error.into()))?;
        }
        tokio::fs::write(&self.path, encoded)
            .await
            .map_err(|error| StoreError::Other(error.into()))
    }
}
