use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use scrypt::Params;
use subtle::ConstantTimeEq;

use crate::error::{AuthError, Result};

const LOG_N: u8 = 14; // N = 2^14
const R: u32 = 8;
const P: u32 = 1;
const OUTPUT_LEN: usize = 32;
const SALT_LEN: usize = 16;

/// A hashed admin password: scrypt output + its salt, both base64-encoded
/// for storage in the config document (spec §4.5).
#[derive(Debug, Clone)]
pub struct HashedPassword {
    pub hash_b64: String,
    pub salt_b64: String,
}

fn params() -> Params {
    Params::new(LOG_N, R, P, OUTPUT_LEN).expect("static scrypt params are valid")
}

pub fn hash_password(password: &str) -> HashedPassword {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let mut out = [0u8; OUTPUT_LEN];
    scrypt::scrypt(password.as_bytes(), &salt, &params(), &mut out)
        .expect("output length matches params");

    HashedPassword {
        hash_b64: B64.encode(out),
        salt_b64: B64.encode(salt),
    }
}

/// Constant-time password verification against a stored hash/salt pair.
pub fn verify_password(password: &str, hash_b64: &str, salt_b64: &str) -> Result<bool> {
    let salt = B64
        .decode(salt_b64)
        .map_err(|e| AuthError::Internal(format!("bad salt encoding: {e}")))?;
    let expected = B64
        .decode(hash_b64)
        .map_err(|e| AuthError::Internal(format!("bad hash encoding: {e}")))?;

    let mut actual = vec![0u8; expected.len()];
    scrypt::scrypt(password.as_bytes(), &salt, &params(), &mut actual)
        .map_err(|e| AuthError::Internal(format!("scrypt failed: {e}")))?;

    Ok(bool::from(actual.ct_eq(&expected)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_verifies() {
        let hashed = hash_password("correct horse battery staple");
        assert!(verify_password(
            "correct horse battery staple",
            &hashed.hash_b64,
            &hashed.salt_b64
        )
        .unwrap());
    }

    #[test]
    fn wrong_password_rejected() {
        let hashed = hash_password("correct horse battery staple");
        assert!(!verify_password("wrong password", &hashed.hash_b64, &hashed.salt_b64).unwrap());
    }

    #[test]
    fn distinct_salts_per_call() {
        let a = hash_password("same password");
        let b = hash_password("same password");
        assert_ne!(a.salt_b64, b.salt_b64);
        assert_ne!(a.hash_b64, b.hash_b64);
    }
}
