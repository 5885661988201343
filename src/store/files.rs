//! Encrypted-at-rest storage for structured data outside the secret
//! vault proper: one `EncryptedRecord` JSON file per name, under a shared
//! data directory and a shared password.

use super::crypto;
use super::record::{Algorithm, EncryptedRecord, Kdf, Profile};
use crate::error::StoreError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub struct SecureFiles {
    data_dir: PathBuf,
    password: Zeroizing<String>,
}

impl SecureFiles {
    pub fn new(data_dir: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(StoreError::NotAllowed(format!("invalid file name: {name}")));
        }
        Ok(self.data_dir.join(format!("{name}.json")))
    }

    pub async fn save_json(&self, name: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        let plaintext = serde_json::to_vec(value).map_err(|error| StoreError::Other(error.into()))?;
        let record = crypto::encrypt(
            &plaintext,
            self.password.as_bytes(),
            Algorithm::XChaCha20Poly1305,
            Kdf::Argon2,
            Profile::Argon2Low,
        )?;
        write_record(&path, &record).await
    }

    pub async fn read_json(&self, name: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(name)?;
        let Some(record) = read_record(&path).await? else {
            return Ok(None);
        };
        let decrypted = crypto::decrypt(&record, self.password.as_bytes())?;
        let value = serde_json::from_slice(&decrypted.plaintext).map_err(|error| StoreError::Other(error.into()))?;
        Ok(Some(value))
    }
}

async fn write_record(path: &Path, record: &EncryptedRecord) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|error| StoreError::Other(error.into()))?;
    }
    let encoded = serde_json::to_vec(record).map_err(|error| StoreError::Other(error.into()))?;
    tokio::fs::write(path, encoded)
        .await
        .map_err(|error| StoreError::Other(error.into()))
}

async fn read_record(path: &Path) -> Result<Option<EncryptedRecord>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let record = serde_json::from_slice(&bytes)
                .map_err(|error| StoreError::CorruptRecord(format!("invalid secure file: {error}")))?;
            Ok(Some(record))
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(StoreError::Other(error.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let files = SecureFiles::new(dir.path(), "pw");
        assert!(files.read_json("cache").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let files = SecureFiles::new(dir.path(), "pw");
        let value = json!({"messages": [], "groups": []});
        files.save_json("cache", &value).await.unwrap();

        let loaded = files.read_json("cache").await.unwrap().unwrap();
        assert_eq!(loaded, value);
    }

    #[tokio::test]
    async fn rejects_non_alphanumeric_names() {
        let dir = tempfile::tempdir().unwrap();
        let files = SecureFiles::new(dir.path(), "pw");
        let error = files.save_json("../escape", &json!({})).await.unwrap_err();
        assert!(matches!(error, StoreError::NotAllowed(_)));
    }
}
