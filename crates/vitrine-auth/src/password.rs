use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt::{Display, Formatter};

type HmacSha256 = Hmac<Sha256>;

pub const PBKDF2_ITERATIONS: u32 = 20_000;
const SALT_LEN: usize = 16;
const SCHEME: &str = "pbkdf2-sha256";
const MAX_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordError(pub String);

impl Display for PasswordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PasswordError {}

// One-block PBKDF2 (RFC 2898): output length equals the HMAC-SHA256 digest,
// so a single chained block suffices.
fn derive(password: &[u8], salt: &[u8], iterations: u32) -> Result<[u8; 32], PasswordError> {
    let mut mac =
        HmacSha256::new_from_slice(password).map_err(|e| PasswordError(e.to_string()))?;
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut block: [u8; 32] = mac.finalize().into_bytes().into();
    let mut out = block;
    for _ in 1..iterations {
        let mut mac =
            HmacSha256::new_from_slice(password).map_err(|e| PasswordError(e.to_string()))?;
        mac.update(&block);
        block = mac.finalize().into_bytes().into();
        for (acc, b) in out.iter_mut().zip(block.iter()) {
            *acc ^= b;
        }
    }
    Ok(out)
}

/// Hash a cleartext password into the stored `pbkdf2-sha256$iters$salt$digest`
/// form with a fresh random salt.
pub fn hash_password(raw: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(raw.as_bytes(), &salt, PBKDF2_ITERATIONS)?;
    Ok(format!(
        "{SCHEME}${PBKDF2_ITERATIONS}${}${}",
        hex::encode(salt),
        hex::encode(digest)
    ))
}

/// Constant-time verification against a stored hash. An unparseable stored
/// value verifies as false rather than erroring, so login keeps its
/// wrong-password path for corrupt rows.
#[must_use]
pub fn verify_password(raw: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iters), Some(salt_hex), Some(digest_hex), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iters.parse::<u32>() else {
        return false;
    };
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return false;
    }
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    let Ok(derived) = derive(raw.as_bytes(), &salt, iterations) else {
        return false;
    };
    // Compare through the MAC verifier to stay constant-time.
    let Ok(mut mac) = HmacSha256::new_from_slice(b"verify") else {
        return false;
    };
    mac.update(&derived);
    let tag = mac.finalize().into_bytes();
    let Ok(mut mac2) = HmacSha256::new_from_slice(b"verify") else {
        return false;
    };
    mac2.update(&expected);
    mac2.verify_slice(&tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let stored = hash_password("hunter22").expect("hash");
        assert!(stored.starts_with("pbkdf2-sha256$"));
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same-password").expect("hash a");
        let b = hash_password("same-password").expect("hash b");
        assert_ne!(a, b);
        assert!(verify_password("same-password", &a));
        assert!(verify_password("same-password", &b));
    }

    #[test]
    fn malformed_stored_values_verify_false() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "bcrypt$10$aa$bb"));
        assert!(!verify_password("x", "pbkdf2-sha256$zz$aa$bb"));
        assert!(!verify_password("x", "pbkdf2-sha256$1000$nothex$nothex"));
    }
}
