#![forbid(unsafe_code)]
//! Storefront domain model SSOT.
//!
//! Validated newtypes parse untrusted input at the edges; entity structs
//! carry the already-validated values the persistence layer reads and writes.

mod catalog;
mod order;
mod user;
mod validate;

pub use catalog::{
    slugify, Category, CategoryRef, CategoryTitle, Description, Price, Product, ProductTitle,
    Quantity, ShippingFee, Slug, SoldCount, DEFAULT_PRODUCT_IMAGE, DESCRIPTION_MAX_LEN,
    DESCRIPTION_MIN_LEN, TITLE_MAX_LEN, TITLE_MIN_LEN,
};
pub use order::{Order, OrderItem, OrderLine, OrderProductRef, OrderStatus, ORDER_STATUS_VALUES};
pub use user::{
    BuyerRef, EmailAddress, PersonName, RawPassword, User, UserName, DEFAULT_USER_IMAGE,
    NAME_MAX_LEN, NAME_MIN_LEN, PASSWORD_MIN_LEN,
};
pub use validate::ValidationError;

pub const CRATE_NAME: &str = "vitrine-model";
