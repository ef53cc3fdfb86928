use std::collections::HashMap;

pub const DEFAULT_PAGE_LIMIT: i64 = 3;
pub const DEFAULT_PRICE_MAX: f64 = 5000.0;

/// Price sort direction for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSort {
    Asc,
    Desc,
}

impl PriceSort {
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductListParams {
    pub page: i64,
    pub limit: i64,
    pub min_price: f64,
    pub max_price: f64,
    pub search: String,
    pub sort_price: PriceSort,
}

impl Default for ProductListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            min_price: 0.0,
            max_price: DEFAULT_PRICE_MAX,
            search: String::new(),
            sort_price: PriceSort::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListParams {
    pub page: i64,
    pub limit: i64,
    pub search: String,
}

impl Default for UserListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            search: String::new(),
        }
    }
}

// Absent, non-numeric, and zero all fall back to the default; pagination
// parameters never reject a request.
fn int_or(query: &HashMap<String, String>, name: &str, default: i64) -> i64 {
    query
        .get(name)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|v| *v != 0)
        .unwrap_or(default)
}

fn float_or(query: &HashMap<String, String>, name: &str, default: f64) -> f64 {
    query
        .get(name)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(default)
}

fn capped_limit(query: &HashMap<String, String>, max_limit: i64) -> i64 {
    let limit = int_or(query, "limit", DEFAULT_PAGE_LIMIT);
    if limit < 1 {
        DEFAULT_PAGE_LIMIT
    } else {
        limit.min(max_limit)
    }
}

#[must_use]
pub fn parse_page_params(query: &HashMap<String, String>, max_limit: i64) -> PageParams {
    PageParams {
        page: int_or(query, "page", 1),
        limit: capped_limit(query, max_limit),
    }
}

#[must_use]
pub fn parse_product_list_params(
    query: &HashMap<String, String>,
    max_limit: i64,
) -> ProductListParams {
    let sort_price = match query.get("sortPrice").map(String::as_str) {
        Some("desc") => PriceSort::Desc,
        _ => PriceSort::Asc,
    };
    ProductListParams {
        page: int_or(query, "page", 1),
        limit: capped_limit(query, max_limit),
        min_price: float_or(query, "minPrice", 0.0),
        max_price: float_or(query, "maxPrice", DEFAULT_PRICE_MAX),
        search: query.get("search").cloned().unwrap_or_default(),
        sort_price,
    }
}

#[must_use]
pub fn parse_user_list_params(query: &HashMap<String, String>, max_limit: i64) -> UserListParams {
    UserListParams {
        page: int_or(query, "page", 1),
        limit: capped_limit(query, max_limit),
        search: query.get("search").cloned().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn product_params_fall_back_to_defaults() {
        let parsed = parse_product_list_params(&query(&[]), 100);
        assert_eq!(parsed, ProductListParams::default());
        assert_eq!(parsed.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(parsed.max_price, DEFAULT_PRICE_MAX);
    }

    #[test]
    fn non_numeric_and_zero_values_use_defaults() {
        let parsed = parse_product_list_params(
            &query(&[("page", "abc"), ("limit", "0"), ("maxPrice", "0")]),
            100,
        );
        assert_eq!(parsed.page, 1);
        assert_eq!(parsed.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(parsed.max_price, DEFAULT_PRICE_MAX);
    }

    #[test]
    fn limit_is_capped_at_the_configured_maximum() {
        let parsed = parse_page_params(&query(&[("limit", "5000")]), 100);
        assert_eq!(parsed.limit, 100);
        let negative = parse_page_params(&query(&[("limit", "-4")]), 100);
        assert_eq!(negative.limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn sort_price_accepts_only_desc_as_non_default() {
        let desc = parse_product_list_params(&query(&[("sortPrice", "desc")]), 100);
        assert_eq!(desc.sort_price, PriceSort::Desc);
        let junk = parse_product_list_params(&query(&[("sortPrice", "sideways")]), 100);
        assert_eq!(junk.sort_price, PriceSort::Asc);
    }

    #[test]
    fn user_params_carry_search_text_verbatim() {
        let parsed = parse_user_list_params(&query(&[("search", "Jane")]), 100);
        assert_eq!(parsed.search, "Jane");
        assert_eq!(parsed.page, 1);
    }
}
