use crate::validate::{bounded_trimmed, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 30;
pub const PASSWORD_MIN_LEN: usize = 6;

pub const DEFAULT_USER_IMAGE: &str = "public/images/users/default-user.png";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("email regex")
});

/// First or last name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct PersonName(String);

impl PersonName {
    pub fn parse(input: &str, what: &str) -> Result<Self, ValidationError> {
        bounded_trimmed(input, what, NAME_MIN_LEN, NAME_MAX_LEN).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for PersonName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct UserName(String);

impl UserName {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        bounded_trimmed(input, "User name", NAME_MIN_LEN, NAME_MAX_LEN).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for UserName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored lowercased; shape checked against the address pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim().to_lowercase();
        if s.is_empty() {
            return Err(ValidationError("Email is required".to_string()));
        }
        if !EMAIL_RE.is_match(&s) {
            return Err(ValidationError("Enter a valid email address".to_string()));
        }
        Ok(Self(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cleartext password as submitted; only ever held long enough to hash.
/// Deliberately no serde and no Display.
#[derive(Clone)]
#[non_exhaustive]
pub struct RawPassword(String);

impl RawPassword {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.chars().count() < PASSWORD_MIN_LEN {
            return Err(ValidationError(format!(
                "Password must be at least {PASSWORD_MIN_LEN} characters"
            )));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawPassword(***)")
    }
}

/// Public user shape; the password hash lives only in the store layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub image: String,
    pub is_admin: bool,
    pub is_banned: bool,
    pub orders: Vec<i64>,
}

/// Buyer as embedded in order payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct BuyerRef {
    pub user_name: String,
    pub email: String,
}
