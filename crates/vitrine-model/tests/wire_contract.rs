// SPDX-License-Identifier: Apache-2.0

use vitrine_model::{
    slugify, Category, CategoryRef, EmailAddress, OrderStatus, Product, Slug, ORDER_STATUS_VALUES,
};

#[test]
fn product_payload_keys_are_stable() {
    let product = Product {
        id: 1,
        title: "Gaming Mouse".to_string(),
        slug: "gaming-mouse".to_string(),
        price: 25.0,
        image: "public/images/products/default-product.png".to_string(),
        category: CategoryRef {
            id: 2,
            title: "Electronics".to_string(),
        },
        description: "Ergonomic".to_string(),
        quantity: 10,
        sold: 0,
        shipping: 5.0,
    };
    let value = serde_json::to_value(&product).expect("json");
    let keys: Vec<&str> = value.as_object().expect("object").keys().map(String::as_str).collect();
    for expected in [
        "id",
        "title",
        "slug",
        "price",
        "image",
        "category",
        "description",
        "quantity",
        "sold",
        "shipping",
    ] {
        assert!(keys.contains(&expected), "missing key {expected}");
    }
    assert!(!keys.contains(&"createdAt"));
    assert_eq!(value["category"]["title"], "Electronics");
}

#[test]
fn category_payload_includes_timestamps() {
    let category = Category {
        id: 2,
        title: "Electronics".to_string(),
        slug: "electronics".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
        updated_at: "2024-01-02T00:00:00Z".to_string(),
    };
    let value = serde_json::to_value(&category).expect("json");
    assert_eq!(value["createdAt"], "2024-01-01T00:00:00Z");
    assert_eq!(value["updatedAt"], "2024-01-02T00:00:00Z");
}

#[test]
fn order_status_wire_strings_are_exhaustive() {
    assert_eq!(ORDER_STATUS_VALUES.len(), 5);
    for s in ORDER_STATUS_VALUES {
        assert_eq!(OrderStatus::parse(s).expect("status").as_str(), s);
    }
}

#[test]
fn slug_derivation_matches_stored_form() {
    for (title, slug) in [
        ("Electronics", "electronics"),
        ("Home & Garden", "home-garden"),
        ("4K TVs", "4k-tvs"),
    ] {
        assert_eq!(slugify(title), slug);
        assert_eq!(Slug::from_title(title).as_str(), slug);
        assert!(Slug::parse(slug).is_ok());
    }
}

#[test]
fn email_rejects_whitespace_and_double_dots() {
    assert!(EmailAddress::parse("jane doe@example.com").is_err());
    assert!(EmailAddress::parse("jane..doe@example.com").is_err());
    assert!(EmailAddress::parse("jane.doe@exa-mple.com").is_ok());
}
