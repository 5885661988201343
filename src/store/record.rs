use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kdf {
    Argon2,
    Pbkdf2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    #[serde(rename = "argon2_low")]
    Argon2Low,
    #[serde(rename = "argon2_high")]
    Argon2High,
    #[serde(rename = "pbkdf2_hmac_sha_256")]
    PbkdfHmacSha256,
    #[serde(rename = "pbkdf2_hmac_sha_1")]
    PbkdfHmacSha1,
}

impl Profile {
    /// Profiles kept around only so previously-written records keep
    /// decrypting; new records never choose these.
    pub fn is_outdated(self) -> bool {
        matches!(self, Profile::PbkdfHmacSha1)
    }
}

/// One symmetric-encryption record as it's written to disk. Legacy records
/// may omit `algorithm` (implying `aes-256-gcm`) and `profile` (implying
/// `pbkdf2_hmac_sha_1`, flagged outdated) — callers should prefer
/// `algorithm()`/`profile()` over the raw fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub ciphertext: String,
    pub tag: String,
    pub nonce: String,
    pub salt: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub algorithm: Option<Algorithm>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kdf: Option<Kdf>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub profile: Option<Profile>,
}

impl EncryptedRecord {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm.unwrap_or(Algorithm::Aes256Gcm)
    }

    pub fn profile(&self) -> Profile {
        self.profile.unwrap_or(Profile::PbkdfHmacSha1)
    }

    pub fn kdf(&self) -> Kdf {
        self.kdf.unwrap_or(Kdf::Pbkdf2)
    }
}
