// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ApiErrorCode {
    ValidationFailed,
    InvalidQueryParameter,
    InvalidJsonBody,
    NotAuthenticated,
    AlreadyAuthenticated,
    InvalidCredentials,
    InvalidToken,
    TokenExpired,
    Forbidden,
    UserBanned,
    NotFound,
    RouteNotFound,
    DuplicateResource,
    InsufficientStock,
    PayloadTooLarge,
    UnsupportedMediaType,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
    pub request_id: String,
}

impl ApiError {
    #[must_use]
    pub fn new(
        code: ApiErrorCode,
        message: impl Into<String>,
        details: Value,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn validation_failed(field_errors: Value) -> Self {
        Self::new(
            ApiErrorCode::ValidationFailed,
            "validation failed",
            json!({"field_errors": field_errors}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn invalid_param(name: &str, value: &str) -> Self {
        Self::new(
            ApiErrorCode::InvalidQueryParameter,
            format!("invalid query parameter: {name}"),
            json!({"field_errors":[{"parameter": name, "reason": "invalid", "value": value}]}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NotFound, message, Value::Null, "req-unknown")
    }

    #[must_use]
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(
            ApiErrorCode::DuplicateResource,
            message,
            Value::Null,
            "req-unknown",
        )
    }

    #[must_use]
    pub fn not_authenticated() -> Self {
        Self::new(
            ApiErrorCode::NotAuthenticated,
            "You are not logged in",
            Value::Null,
            "req-unknown",
        )
    }

    #[must_use]
    pub fn already_authenticated() -> Self {
        Self::new(
            ApiErrorCode::AlreadyAuthenticated,
            "You are already logged in",
            Value::Null,
            "req-unknown",
        )
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Forbidden, message, Value::Null, "req-unknown")
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Internal, message, Value::Null, "req-unknown")
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = request_id.to_string();
        self
    }
}

const _: fn() = || {
    fn assert_traits<T: Serialize + for<'de> Deserialize<'de>>() {}
    assert_traits::<ApiErrorCode>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_snake_case() {
        let err = ApiError::new(
            ApiErrorCode::InsufficientStock,
            "Not enough stock of product with this id: 4",
            Value::Null,
            "req-0000000000000001",
        );
        let value = serde_json::to_value(&err).expect("json");
        assert_eq!(value["code"], "insufficient_stock");
        assert_eq!(value["request_id"], "req-0000000000000001");
    }

    #[test]
    fn with_request_id_replaces_placeholder() {
        let err = ApiError::not_found("Order not found with this id: 9");
        assert_eq!(err.request_id, "req-unknown");
        let stamped = err.with_request_id("req-000000000000002a");
        assert_eq!(stamped.request_id, "req-000000000000002a");
    }
}
