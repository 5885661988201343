//! Symmetric authenticated encryption of small JSON blobs: key derivation,
//! encrypt/decrypt, and the legacy-profile flagging the store surfaces to
//! callers so they can trigger a `reencrypt`.

use super::record::{Algorithm, EncryptedRecord, Kdf, Profile};
use crate::error::StoreError;
use aes_gcm::Aes256Gcm;
use aes_gcm::aead::{Aead, KeyInit};
use chacha20poly1305::XChaCha20Poly1305;
use rand::RngCore;
use zeroize::Zeroizing;

const SALT_LEN: usize = 16;
const GCM_NONCE_LEN: usize = 12;
const XCHACHA_NONCE_LEN: usize = 24;
const PBKDF2_ITERATIONS: u32 = 600_000;

/// The result of a successful decrypt: the plaintext, and whether the
/// record was encrypted under a profile callers should rotate away from.
pub struct Decrypted {
    pub plaintext: Vec<u8>,
    pub outdated: bool,
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Argon2 is always available at `argon2_low`; `argon2_high` additionally
/// requires at least 2 GiB of available RAM, checked here at encrypt time.
/// Records written under either profile decrypt identically regardless of
/// the machine decrypting them — the memory check only gates which profile
/// new writes may choose.
pub fn host_supports_argon2_high() -> bool {
    const REQUIRED_KIB: u64 = 2 * 1024 * 1024;

    let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") else {
        return false;
    };
    meminfo
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kib| kib.parse::<u64>().ok())
        .is_some_and(|kib| kib >= REQUIRED_KIB)
}

fn argon2_params(profile: Profile) -> argon2::Params {
    match profile {
        // ~19 MiB, 2 passes: usable on constrained hosts.
        Profile::Argon2Low => argon2::Params::new(19_456, 2, 1, Some(32)).expect("valid argon2 params"),
        // ~256 MiB, 3 passes: stronger, reserved for hosts with memory to spare.
        Profile::Argon2High => argon2::Params::new(262_144, 3, 1, Some(32)).expect("valid argon2 params"),
        _ => unreachable!("argon2_params called with a non-argon2 profile"),
    }
}

fn derive_key(password: &[u8], salt: &[u8], kdf: Kdf, profile: Profile) -> Result<Zeroizing<[u8; 32]>, StoreError> {
    let mut key = Zeroizing::new([0u8; 32]);
    match kdf {
        Kdf::Argon2 => {
            use argon2::Argon2;
            let params = argon2_params(profile);
            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
            argon2
                .hash_password_into(password, salt, &mut *key)
                .map_err(|error| StoreError::CorruptRecord(format!("argon2 derivation failed: {error}")))?;
        }
        Kdf::Pbkdf2 => match profile {
            Profile::PbkdfHmacSha256 => {
                pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, PBKDF2_ITERATIONS, &mut *key);
            }
            Profile::PbkdfHmacSha1 | _ => {
                pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, salt, PBKDF2_ITERATIONS, &mut *key);
            }
        },
    }
    Ok(key)
}

pub fn encrypt(
    plaintext: &[u8],
    password: &[u8],
    algorithm: Algorithm,
    kdf: Kdf,
    profile: Profile,
) -> Result<EncryptedRecord, StoreError> {
    let salt = random_bytes(SALT_LEN);
    let key = derive_key(password, &salt, kdf, profile)?;

    let (nonce, mut sealed) = match algorithm {
        Algorithm::Aes256Gcm => {
            let nonce = random_bytes(GCM_NONCE_LEN);
            let cipher = Aes256Gcm::new_from_slice(&*key)
                .map_err(|error| StoreError::CorruptRecord(error.to_string()))?;
            let sealed = cipher
                .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext)
                .map_err(|_| StoreError::CorruptRecord("encryption failed".to_string()))?;
            (nonce, sealed)
        }
        Algorithm::XChaCha20Poly1305 => {
            let nonce = random_bytes(XCHACHA_NONCE_LEN);
            let cipher = XChaCha20Poly1305::new_from_slice(&*key)
                .map_err(|error| StoreError::CorruptRecord(error.to_string()))?;
            let sealed = cipher
                .encrypt(chacha20poly1305::XNonce::from_slice(&nonce), plaintext)
                .map_err(|_| StoreError::CorruptRecord("encryption failed".to_string()))?;
            (nonce, sealed)
        }
    };

    // Both AEAD implementations append a 16-byte tag to the ciphertext;
    // split it out so the on-disk record matches the documented shape of
    // separate `ciphertext`/`tag` fields.
    let tag = sealed.split_off(sealed.len() - 16);

    Ok(EncryptedRecord {
        ciphertext: base64_encode(&sealed),
        tag: base64_encode(&tag),
        nonce: base64_encode(&nonce),
        salt: base64_encode(&salt),
        algorithm: Some(algorithm),
        kdf: Some(kdf),
        profile: Some(profile),
    })
}

pub fn decrypt(record: &EncryptedRecord, password: &[u8]) -> Result<Decrypted, StoreError> {
    let algorithm = record.algorithm();
    let kdf = record.kdf();
    let profile = record.profile();

    let salt = base64_decode(&record.salt)?;
    let nonce = base64_decode(&record.nonce)?;
    let mut combined = base64_decode(&record.ciphertext)?;
    combined.extend_from_slice(&base64_decode(&record.tag)?);

    let key = derive_key(password, &salt, kdf, profile)?;

    let plaintext = match algorithm {
        Algorithm::Aes256Gcm => {
            if nonce.len() != GCM_NONCE_LEN {
                return Err(StoreError::CorruptRecord("unexpected nonce length".to_string()));
            }
            let cipher = Aes256Gcm::new_from_slice(&*key)
                .map_err(|error| StoreError::CorruptRecord(error.to_string()))?;
            cipher
                .decrypt(aes_gcm::Nonce::from_slice(&nonce), combined.as_slice())
                .map_err(|_| StoreError::BadPassword)?
        }
        Algorithm::XChaCha20Poly1305 => {
            if nonce.len() != XCHACHA_NONCE_LEN {
                return Err(StoreError::CorruptRecord("unexpected nonce length".to_string()));
            }
            let cipher = XChaCha20Poly1305::new_from_slice(&*key)
                .map_err(|error| StoreError::CorruptRecord(error.to_string()))?;
            cipher
                .decrypt(chacha20poly1305::XNonce::from_slice(&nonce), combined.as_slice())
                .map_err(|_| StoreError::BadPassword)?
        }
    };

    Ok(Decrypted {
        plaintext,
        outdated: profile.is_outdated(),
    })
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(value: &str) -> Result<Vec<u8>, StoreError> {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|error| StoreError::CorruptRecord(format!("invalid base64: {error}")))
}
