use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use tracing::{info, warn};

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Symmetric encryption for provider credentials and API-key secrets at rest.
///
/// Lazily initialized process-wide singleton (see [`global`]); safe for
/// concurrent readers since `Aes256Gcm` encrypt/decrypt take `&self`.
pub struct SecretVault {
    cipher: Aes256Gcm,
}

impl SecretVault {
    fn from_key_bytes(key: &[u8; KEY_LEN]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Load the key from `path`, generating and writing a fresh one if the
    /// file is missing or unparseable. Accepts 32 raw bytes, 64 hex chars,
    /// or base64 decoding to 32 bytes.
    pub fn load_or_generate(path: &PathBuf) -> Self {
        if let Ok(contents) = fs::read(path) {
            if let Some(key) = parse_key(&contents) {
                return Self::from_key_bytes(&key);
            }
            warn!(path = %path.display(), "encryption key unparseable, regenerating");
        }

        let mut key = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut key);

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(e) = write_key_file(path, &key) {
            warn!(path = %path.display(), error = %e, "failed to persist new encryption key");
        } else {
            info!(path = %path.display(), "generated new encryption key");
        }

        Self::from_key_bytes(&key)
    }

    /// AES-256-GCM encrypt with a fresh random 12-byte IV.
    /// Output: `base64(iv || tag || ciphertext)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> String {
        let mut iv_bytes = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv_bytes);
        let nonce = Nonce::from_slice(&iv_bytes);

        // aes-gcm returns ciphertext || tag; reorder to iv || tag || ciphertext.
        let ciphertext_and_tag = self
            .cipher
            .encrypt(nonce, plaintext)
            .expect("AES-GCM encryption is infallible for bounded plaintexts");
        let split = ciphertext_and_tag.len() - TAG_LEN;
        let (ciphertext, tag) = ciphertext_and_tag.split_at(split);

        let mut out = Vec::with_capacity(IV_LEN + ciphertext_and_tag.len());
        out.extend_from_slice(&iv_bytes);
        out.extend_from_slice(tag);
        out.extend_from_slice(ciphertext);
        B64.encode(out)
    }

    /// Decrypt a value produced by [`Self::encrypt`]. Never panics or
    /// returns an `Err` path to callers that would propagate as a fault —
    /// truncated input or a tag mismatch simply yield `None`.
    pub fn decrypt(&self, encoded: &str) -> Option<Vec<u8>> {
        let raw = B64.decode(encoded).ok()?;
        if raw.len() < IV_LEN + TAG_LEN {
            return None;
        }
        let (iv, rest) = raw.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        let nonce = Nonce::from_slice(iv);

        let mut ciphertext_and_tag = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        ciphertext_and_tag.extend_from_slice(ciphertext);
        ciphertext_and_tag.extend_from_slice(tag);
        self.cipher.decrypt(nonce, ciphertext_and_tag.as_slice()).ok()
    }
}

fn parse_key(contents: &[u8]) -> Option<[u8; KEY_LEN]> {
    if contents.len() == KEY_LEN {
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(contents);
        return Some(key);
    }

    let text = std::str::from_utf8(contents).ok()?.trim();

    if text.len() == KEY_LEN * 2 {
        if let Ok(bytes) = hex::decode(text) {
            if bytes.len() == KEY_LEN {
                let mut key = [0u8; KEY_LEN];
                key.copy_from_slice(&bytes);
                return Some(key);
            }
        }
    }

    if let Ok(bytes) = B64.decode(text) {
        if bytes.len() == KEY_LEN {
            let mut key = [0u8; KEY_LEN];
            key.copy_from_slice(&bytes);
            return Some(key);
        }
    }

    None
}

#[cfg(unix)]
fn write_key_file(path: &PathBuf, key: &[u8; KEY_LEN]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, hex::encode(key))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_key_file(path: &PathBuf, key: &[u8; KEY_LEN]) -> std::io::Result<()> {
    fs::write(path, hex::encode(key))
}

static GLOBAL: OnceLock<SecretVault> = OnceLock::new();

/// Process-wide lazily-initialized vault, keyed at `~/.cc-gw/encryption.key`
/// (or `$CC_GW_HOME/encryption.key`).
pub fn global() -> &'static SecretVault {
    GLOBAL.get_or_init(|| SecretVault::load_or_generate(&crate::home_dir().join("encryption.key")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> SecretVault {
        let mut key = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        SecretVault::from_key_bytes(&key)
    }

    #[test]
    fn round_trip() {
        let v = vault();
        for sample in ["", "hello", "a longer secret value with spaces and 🦀"] {
            let enc = v.encrypt(sample.as_bytes());
            let dec = v.decrypt(&enc).unwrap();
            assert_eq!(dec, sample.as_bytes());
        }
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let v = vault();
        let enc = v.encrypt(b"top secret");
        let mut raw = B64.decode(&enc).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = B64.encode(raw);
        assert!(v.decrypt(&tampered).is_none());
    }

    #[test]
    fn truncated_input_fails_to_decrypt() {
        let v = vault();
        assert!(v.decrypt(&B64.encode(b"short")).is_none());
    }

    #[test]
    fn accepts_hex_and_base64_keys() {
        let dir = tempfile::tempdir().unwrap();
        let hex_path = dir.path().join("hex.key");
        fs::write(&hex_path, hex::encode([7u8; KEY_LEN])).unwrap();
        let _ = SecretVault::load_or_generate(&hex_path);

        let b64_path = dir.path().join("b64.key");
        fs::write(&b64_path, B64.encode([7u8; KEY_LEN])).unwrap();
        let _ = SecretVault::load_or_generate(&b64_path);
    }
}
