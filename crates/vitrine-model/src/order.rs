use crate::user::BuyerRef;
use crate::validate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const ORDER_STATUS_VALUES: [&str; 5] = [
    "Not Processed",
    "Processing",
    "Shipped",
    "Delivered",
    "Cancelled",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Not Processed")]
    NotProcessed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim() {
            "Not Processed" => Ok(Self::NotProcessed),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(ValidationError(format!(
                "unknown order status: {other} (expected one of {})",
                ORDER_STATUS_VALUES.join(", ")
            ))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotProcessed => "Not Processed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::NotProcessed
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One requested line of a new order: product id plus quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderItem {
    pub product: i64,
    pub qty: i64,
}

/// Product as embedded in order payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderProductRef {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub shipping: f64,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderLine {
    pub product: OrderProductRef,
    pub qty: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub buyer: BuyerRef,
    pub order_items: Vec<OrderLine>,
    pub amount: f64,
    pub total_products: i64,
    pub status: OrderStatus,
    pub created_at: String,
}
