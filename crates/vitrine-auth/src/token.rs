use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION_V1: &str = "v1";
const MAX_TOKEN_LEN: usize = 2048;
const MAX_PAYLOAD_PART_LEN: usize = 1792;
const MAX_SIG_PART_LEN: usize = 128;

/// Session tokens back the login cookie; activation tokens carry a pending
/// registration through the emailed link.
pub const SESSION_TTL_SECS: i64 = 60 * 60;
pub const ACTIVATION_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenErrorCode {
    InvalidFormat,
    UnsupportedVersion,
    InvalidSignature,
    InvalidPayload,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenError {
    pub code: TokenErrorCode,
    pub message: String,
}

impl TokenError {
    #[must_use]
    pub fn new(code: TokenErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for TokenError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: i64,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// The whole pending registration rides in the token; the account row is
/// only created when the activation link is followed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivationClaims {
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

trait Expiring {
    fn expires_at(&self) -> i64;
}

impl Expiring for SessionClaims {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

impl Expiring for ActivationClaims {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

fn encode_token<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, TokenError> {
    let payload_bytes = serde_json::to_vec(claims)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidPayload, e.to_string()))?;
    let payload_part = URL_SAFE_NO_PAD.encode(payload_bytes);
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidPayload, e.to_string()))?;
    mac.update(payload_part.as_bytes());
    let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{TOKEN_VERSION_V1}.{payload_part}.{sig_part}"))
}

fn decode_token<T: DeserializeOwned + Expiring>(
    token: &str,
    secret: &[u8],
    now: i64,
) -> Result<T, TokenError> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(TokenError::new(
            TokenErrorCode::InvalidFormat,
            "token exceeds max length",
        ));
    }
    let parts: Vec<&str> = token.split('.').collect();
    let (payload_part, sig_part) = match parts.as_slice() {
        [version, payload, sig] if *version == TOKEN_VERSION_V1 => (*payload, *sig),
        [version, _, _] => {
            return Err(TokenError::new(
                TokenErrorCode::UnsupportedVersion,
                format!("unsupported token version: {version}"),
            ))
        }
        _ => {
            return Err(TokenError::new(
                TokenErrorCode::InvalidFormat,
                "invalid token format",
            ))
        }
    };
    if payload_part.len() > MAX_PAYLOAD_PART_LEN || sig_part.len() > MAX_SIG_PART_LEN {
        return Err(TokenError::new(
            TokenErrorCode::InvalidFormat,
            "token part exceeds max length",
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidPayload, e.to_string()))?;
    mac.update(payload_part.as_bytes());
    let expected = URL_SAFE_NO_PAD
        .decode(sig_part)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidFormat, e.to_string()))?;
    mac.verify_slice(&expected).map_err(|_| {
        TokenError::new(TokenErrorCode::InvalidSignature, "token signature mismatch")
    })?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_part)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidFormat, e.to_string()))?;
    let claims: T = serde_json::from_slice(&payload_bytes)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidPayload, e.to_string()))?;

    if claims.expires_at() <= now {
        return Err(TokenError::new(TokenErrorCode::Expired, "token expired"));
    }
    Ok(claims)
}

pub fn sign_session(user_id: i64, secret: &[u8]) -> Result<String, TokenError> {
    let now = Utc::now().timestamp();
    encode_token(
        &SessionClaims {
            user_id,
            issued_at: now,
            expires_at: now + SESSION_TTL_SECS,
        },
        secret,
    )
}

pub fn verify_session(token: &str, secret: &[u8]) -> Result<SessionClaims, TokenError> {
    decode_token(token, secret, Utc::now().timestamp())
}

pub fn sign_activation(
    first_name: &str,
    last_name: &str,
    user_name: &str,
    email: &str,
    password_hash: &str,
    secret: &[u8],
) -> Result<String, TokenError> {
    let now = Utc::now().timestamp();
    encode_token(
        &ActivationClaims {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            user_name: user_name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            issued_at: now,
            expires_at: now + ACTIVATION_TTL_SECS,
        },
        secret,
    )
}

pub fn verify_activation(token: &str, secret: &[u8]) -> Result<ActivationClaims, TokenError> {
    decode_token(token, secret, Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-session-secret";

    #[test]
    fn session_token_round_trip() {
        let token = sign_session(42, SECRET).expect("sign");
        assert!(token.starts_with("v1."));
        let claims = verify_session(&token, SECRET).expect("verify");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.expires_at - claims.issued_at, SESSION_TTL_SECS);
    }

    #[test]
    fn tampered_payload_is_rejected_as_bad_signature() {
        let token = sign_session(42, SECRET).expect("sign");
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&SessionClaims {
                user_id: 1,
                issued_at: 0,
                expires_at: i64::MAX,
            })
            .expect("json"),
        );
        parts[1] = forged;
        let err = verify_session(&parts.join("."), SECRET).expect_err("forged");
        assert_eq!(err.code, TokenErrorCode::InvalidSignature);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_session(42, SECRET).expect("sign");
        let err = verify_session(&token, b"other-secret").expect_err("wrong secret");
        assert_eq!(err.code, TokenErrorCode::InvalidSignature);
    }

    #[test]
    fn expired_token_reports_expired_not_invalid() {
        let claims = SessionClaims {
            user_id: 7,
            issued_at: 0,
            expires_at: 10,
        };
        let token = encode_token(&claims, SECRET).expect("encode");
        let err = decode_token::<SessionClaims>(&token, SECRET, 11).expect_err("expired");
        assert_eq!(err.code, TokenErrorCode::Expired);
        let ok = decode_token::<SessionClaims>(&token, SECRET, 9).expect("still valid");
        assert_eq!(ok.user_id, 7);
    }

    #[test]
    fn activation_claims_carry_the_pending_registration() {
        let token = sign_activation(
            "Jane",
            "Doe",
            "janed",
            "jane@example.com",
            "pbkdf2-sha256$1000$aa$bb",
            SECRET,
        )
        .expect("sign");
        let claims = verify_activation(&token, SECRET).expect("verify");
        assert_eq!(claims.user_name, "janed");
        assert_eq!(claims.password_hash, "pbkdf2-sha256$1000$aa$bb");
        assert_eq!(claims.expires_at - claims.issued_at, ACTIVATION_TTL_SECS);
    }

    #[test]
    fn malformed_tokens_report_format_errors() {
        for raw in ["", "v1", "v1.onlypayload", "a.b.c.d"] {
            let err = verify_session(raw, SECRET).expect_err("malformed");
            assert_eq!(err.code, TokenErrorCode::InvalidFormat);
        }
        let err = verify_session("v2.abc.def", SECRET).expect_err("version");
        assert_eq!(err.code, TokenErrorCode::UnsupportedVersion);
    }
}
