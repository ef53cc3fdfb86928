use crate::validate::{bounded_trimmed, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const TITLE_MIN_LEN: usize = 3;
pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MIN_LEN: usize = 3;
pub const DESCRIPTION_MAX_LEN: usize = 400;

pub const DEFAULT_PRODUCT_IMAGE: &str = "public/images/products/default-product.png";

/// Lowercase URL slug derived from a title: alphanumeric runs joined by
/// single dashes, everything else dropped.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct ProductTitle(String);

impl ProductTitle {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        bounded_trimmed(input, "Product title", TITLE_MIN_LEN, TITLE_MAX_LEN).map(Self)
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

impl Display for ProductTitle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct CategoryTitle(String);

impl CategoryTitle {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        bounded_trimmed(input, "Category title", TITLE_MIN_LEN, TITLE_MAX_LEN).map(Self)
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

impl Display for CategoryTitle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct Description(String);

impl Description {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        bounded_trimmed(
            input,
            "Description",
            DESCRIPTION_MIN_LEN,
            DESCRIPTION_MAX_LEN,
        )
        .map(Self)
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

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct Slug(String);

impl Slug {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("slug must not be empty".to_string()));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError(
                "slug must match [a-z0-9-]+ in kebab-case".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn from_title(title: &str) -> Self {
        Self(slugify(title))
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

impl Display for Slug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[non_exhaustive]
pub struct Price(f64);

impl Price {
    pub fn parse(input: f64) -> Result<Self, ValidationError> {
        if !input.is_finite() || input < 0.0 {
            return Err(ValidationError(
                "Price must be a positive number".to_string(),
            ));
        }
        Ok(Self(input))
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[non_exhaustive]
pub struct ShippingFee(f64);

impl ShippingFee {
    pub fn parse(input: f64) -> Result<Self, ValidationError> {
        if !input.is_finite() || input < 0.0 {
            return Err(ValidationError(
                "Shipping must be greater than or equal to 0".to_string(),
            ));
        }
        Ok(Self(input))
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// A strictly positive unit count: order line quantities and initial stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct Quantity(i64);

impl Quantity {
    pub fn parse(input: i64) -> Result<Self, ValidationError> {
        if input < 1 {
            return Err(ValidationError(
                "Quantity must be a positive number greater than 0".to_string(),
            ));
        }
        Ok(Self(input))
    }

    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct SoldCount(i64);

impl SoldCount {
    pub fn parse(input: i64) -> Result<Self, ValidationError> {
        if input < 0 {
            return Err(ValidationError(
                "Sold must be greater than or equal to 0".to_string(),
            ));
        }
        Ok(Self(input))
    }

    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Category as embedded in product payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryRef {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub price: f64,
    pub image: String,
    pub category: CategoryRef,
    pub description: String,
    pub quantity: i64,
    pub sold: i64,
    pub shipping: f64,
}
