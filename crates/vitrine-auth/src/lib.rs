#![forbid(unsafe_code)]
//! Credentials and session plumbing: PBKDF2-shaped password hashes and
//! HMAC-signed tokens carried in the `access_token` cookie.

mod cookie;
mod password;
mod token;

pub use cookie::{
    clear_session_cookie, session_cookie, session_token_from_cookie_header, SESSION_COOKIE,
    SESSION_COOKIE_MAX_AGE_SECS,
};
pub use password::{hash_password, verify_password, PasswordError, PBKDF2_ITERATIONS};
pub use token::{
    sign_activation, sign_session, verify_activation, verify_session, ActivationClaims,
    SessionClaims, TokenError, TokenErrorCode, ACTIVATION_TTL_SECS, SESSION_TTL_SECS,
};

pub const CRATE_NAME: &str = "vitrine-auth";
