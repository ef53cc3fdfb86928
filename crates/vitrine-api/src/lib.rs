#![forbid(unsafe_code)]
//! Wire contract for the storefront API: the error envelope every endpoint
//! speaks and the query-parameter parsing for the list endpoints.

mod errors;
mod params;

pub use errors::{ApiError, ApiErrorCode};
pub use params::{
    parse_page_params, parse_product_list_params, parse_user_list_params, PageParams, PriceSort,
    ProductListParams, UserListParams, DEFAULT_PAGE_LIMIT, DEFAULT_PRICE_MAX,
};

pub const CRATE_NAME: &str = "vitrine-api";
