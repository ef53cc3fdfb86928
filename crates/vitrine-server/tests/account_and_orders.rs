use std::sync::Arc;

use serde_json::Value;
use tempfile::{tempdir, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use vitrine_auth::{hash_password, sign_activation};
use vitrine_model::{
    CategoryTitle, Description, EmailAddress, PersonName, Price, ProductTitle, Quantity, UserName,
};
use vitrine_server::{build_router, AppState, RecordingMailer, ServerConfig};
use vitrine_store::{
    create_category, create_product, create_user, toggle_ban_by_user_name,
    toggle_role_by_user_name, NewProduct, NewUser, Store,
};

const ACTIVATION_KEY: &str = "orders-activation-key";
const ACTIVATION_URL: &str = "http://localhost:3000/activation/";

fn test_state(tmp: &TempDir) -> (AppState, Arc<RecordingMailer>) {
    let config = ServerConfig {
        public_dir: tmp.path().join("public"),
        session_key: "orders-session-key".to_string(),
        activation_key: ACTIVATION_KEY.to_string(),
        activation_url_base: ACTIVATION_URL.to_string(),
        ..ServerConfig::default()
    };
    let store = Store::open_in_memory().expect("in-memory store");
    let mailer = Arc::new(RecordingMailer::default());
    (AppState::new(store, config, mailer.clone()), mailer)
}

async fn spawn_server(state: AppState) -> std::net::SocketAddr {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

async fn send_raw(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<(&str, &str)>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    if let Some((content_type, payload)) = body {
        req.push_str(&format!(
            "content-type: {content_type}\r\ncontent-length: {}\r\n",
            payload.len()
        ));
    }
    req.push_str("\r\n");
    if let Some((_, payload)) = body {
        req.push_str(payload);
    }
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

fn json_of(body: &str) -> Value {
    serde_json::from_str(body).expect("json body")
}

fn session_cookie_from(head: &str) -> String {
    head.lines()
        .find_map(|line| line.strip_prefix("set-cookie: "))
        .and_then(|value| value.split(';').next())
        .expect("set-cookie header")
        .to_string()
}

fn seed_account(state: &AppState, first: &str, user_name: &str, email: &str, admin: bool) {
    let input = NewUser {
        first_name: PersonName::parse(first, "First name").expect("first name"),
        last_name: PersonName::parse("Tester", "Last name").expect("last name"),
        user_name: UserName::parse(user_name).expect("user name"),
        email: EmailAddress::parse(email).expect("email"),
        password_hash: hash_password("hunter22").expect("hash password"),
        image: None,
    };
    state
        .store
        .with_write(|conn| create_user(conn, &input))
        .expect("create user");
    if admin {
        let name = user_name.to_string();
        state
            .store
            .with_write(|conn| toggle_role_by_user_name(conn, &name))
            .expect("promote admin");
    }
}

fn seed_product(state: &AppState, title: &str, price: f64, category_id: i64, quantity: i64) -> i64 {
    let input = NewProduct {
        title: ProductTitle::parse(title).expect("product title"),
        price: Price::parse(price).expect("price"),
        category_id,
        description: Description::parse("Seeded for the test run").expect("description"),
        quantity: Quantity::parse(quantity).expect("quantity"),
        sold: None,
        shipping: None,
        image: None,
    };
    state
        .store
        .with_write(|conn| create_product(conn, &input))
        .expect("create product")
        .id
}

fn seed_catalog(state: &AppState) -> (i64, i64) {
    let title = CategoryTitle::parse("Electronics").expect("category title");
    let category = state
        .store
        .with_write(|conn| create_category(conn, &title))
        .expect("create category");
    let mouse = seed_product(state, "Gaming Mouse", 25.0, category.id, 10);
    let cable = seed_product(state, "Usb Cable", 10.0, category.id, 5);
    (mouse, cable)
}

async fn login(addr: std::net::SocketAddr, email: &str) -> String {
    let body = format!(r#"{{"email":"{email}","password":"hunter22"}}"#);
    let (status, head, _) = send_raw(
        addr,
        "POST",
        "/auth/login",
        &[],
        Some(("application/json", &body)),
    )
    .await;
    assert_eq!(status, 200);
    session_cookie_from(&head)
}

fn register_body(first: &str, user_name: &str, email: &str, password: &str) -> String {
    format!(
        r#"{{"firstName":"{first}","lastName":"Tester","userName":"{user_name}","email":"{email}","password":"{password}"}}"#
    )
}

#[tokio::test]
async fn registration_activation_and_login_flow() {
    let tmp = tempdir().expect("tempdir");
    let (state, mailer) = test_state(&tmp);
    let addr = spawn_server(state).await;

    let body = register_body("Ada", "ada", "ada@example.com", "hunter22");
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/users/process-register",
        &[],
        Some(("application/json", &body)),
    )
    .await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "Check your Email to activate your account");
    assert!(json.get("payload").is_none());

    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "Activate Your Account");
    let link_start = sent[0].html.find(ACTIVATION_URL).expect("activation link");
    let token: String = sent[0].html[link_start + ACTIVATION_URL.len()..]
        .chars()
        .take_while(|c| *c != '"')
        .collect();
    assert!(!token.is_empty());

    // Nothing is stored until the account is activated.
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/auth/login",
        &[],
        Some((
            "application/json",
            r#"{"email":"ada@example.com","password":"hunter22"}"#,
        )),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "User not found with this email"
    );

    let activate_path = format!("/users/activate/{token}");
    let (status, _, resp) = send_raw(addr, "GET", &activate_path, &[], None).await;
    assert_eq!(status, 201);
    assert_eq!(json_of(&resp)["message"], "User activated");

    // Second activation of the same token hits the uniqueness checks.
    let (status, _, resp) = send_raw(addr, "GET", &activate_path, &[], None).await;
    assert_eq!(status, 409);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "User already exist with this user name: ada (Try different user name)"
    );

    let cookie = login(addr, "ada@example.com").await;
    assert!(cookie.starts_with("access_token="));

    let (status, _, resp) = send_raw(
        addr,
        "GET",
        "/users/user/profile",
        &[("Cookie", &cookie)],
        None,
    )
    .await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "User profile returned");
    assert_eq!(json["payload"]["user"]["firstName"], "Ada");
    assert_eq!(json["payload"]["user"]["isAdmin"], false);

    let (status, head, resp) = send_raw(
        addr,
        "POST",
        "/auth/logout",
        &[("Cookie", &cookie)],
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json_of(&resp)["message"], "User is logged out");
    let cleared = head
        .lines()
        .find_map(|line| line.strip_prefix("set-cookie: "))
        .expect("set-cookie header");
    assert!(cleared.starts_with("access_token=;"));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn registration_rejects_duplicates_and_bad_input() {
    let tmp = tempdir().expect("tempdir");
    let (state, mailer) = test_state(&tmp);
    seed_account(&state, "Olga", "olga", "olga@example.com", false);
    let addr = spawn_server(state).await;

    let body = register_body("Olga", "olga", "other@example.com", "hunter22");
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/users/process-register",
        &[],
        Some(("application/json", &body)),
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "User already exist with this user name: olga (Try different user name)"
    );

    let body = register_body("Olga", "olga2", "olga@example.com", "hunter22");
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/users/process-register",
        &[],
        Some(("application/json", &body)),
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "User already exist with this email: olga@example.com (Try different email)"
    );

    let body = register_body("Pia", "pia", "pia@example.com", "tiny");
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/users/process-register",
        &[],
        Some(("application/json", &body)),
    )
    .await;
    assert_eq!(status, 422);
    let json = json_of(&resp);
    assert_eq!(json["error"]["code"], "validation_failed");
    assert_eq!(
        json["error"]["message"],
        "Password must be at least 6 characters"
    );

    let body = register_body("Pia", "pia", "not-an-email", "hunter22");
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/users/process-register",
        &[],
        Some(("application/json", &body)),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "Enter a valid email address"
    );

    // None of the rejected attempts should have produced mail.
    assert!(mailer.sent().await.is_empty());
}

#[tokio::test]
async fn activation_rejects_garbage_and_foreign_tokens() {
    let tmp = tempdir().expect("tempdir");
    let (state, _) = test_state(&tmp);
    let addr = spawn_server(state).await;

    let (status, _, resp) = send_raw(addr, "GET", "/users/activate/garbage", &[], None).await;
    assert_eq!(status, 401);
    let json = json_of(&resp);
    assert_eq!(json["error"]["code"], "invalid_token");
    assert_eq!(json["error"]["message"], "Invalid token");

    let foreign = sign_activation(
        "Mallory",
        "Intruder",
        "mallory",
        "mallory@example.com",
        &hash_password("hunter22").expect("hash password"),
        b"some-other-service-key",
    )
    .expect("sign token");
    let path = format!("/users/activate/{foreign}");
    let (status, _, resp) = send_raw(addr, "GET", &path, &[], None).await;
    assert_eq!(status, 401);
    assert_eq!(json_of(&resp)["error"]["message"], "Invalid token");
}

#[tokio::test]
async fn login_failures_report_the_exact_reason() {
    let tmp = tempdir().expect("tempdir");
    let (state, _) = test_state(&tmp);
    seed_account(&state, "Carl", "carl", "carl@example.com", false);
    seed_account(&state, "Bo", "bo", "bo@example.com", false);
    state
        .store
        .with_write(|conn| toggle_ban_by_user_name(conn, "bo"))
        .expect("ban bo");
    let addr = spawn_server(state).await;

    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/auth/login",
        &[],
        Some((
            "application/json",
            r#"{"email":"ghost@example.com","password":"hunter22"}"#,
        )),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "User not found with this email"
    );

    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/auth/login",
        &[],
        Some((
            "application/json",
            r#"{"email":"carl@example.com","password":"wrong-pass"}"#,
        )),
    )
    .await;
    assert_eq!(status, 401);
    let json = json_of(&resp);
    assert_eq!(json["error"]["code"], "invalid_credentials");
    assert_eq!(json["error"]["message"], "Password doesn't match");

    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/auth/login",
        &[],
        Some((
            "application/json",
            r#"{"email":"bo@example.com","password":"hunter22"}"#,
        )),
    )
    .await;
    assert_eq!(status, 403);
    let json = json_of(&resp);
    assert_eq!(json["error"]["code"], "user_banned");
    assert_eq!(
        json["error"]["message"],
        "User is banned, please contact support"
    );
}

#[tokio::test]
async fn admin_manages_user_accounts() {
    let tmp = tempdir().expect("tempdir");
    let (state, _) = test_state(&tmp);
    seed_account(&state, "Olga", "olga", "olga@example.com", true);
    seed_account(&state, "Carl", "carl", "carl@example.com", false);
    let addr = spawn_server(state).await;
    let admin = login(addr, "olga@example.com").await;
    let auth: &[(&str, &str)] = &[("Cookie", &admin)];

    let (status, _, resp) = send_raw(addr, "GET", "/users?search=carl", auth, None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "Users returned");
    assert_eq!(json["payload"]["users"][0]["userName"], "carl");

    let (status, _, resp) = send_raw(addr, "GET", "/users/carl", auth, None).await;
    assert_eq!(status, 200);
    assert_eq!(json_of(&resp)["message"], "Single user returned");

    let (status, _, resp) = send_raw(addr, "PUT", "/users/updateBan/carl", auth, None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "User status is updated");
    assert_eq!(json["payload"]["user"]["isBanned"], true);

    let (status, _, resp) = send_raw(addr, "PUT", "/users/updateRole/carl", auth, None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "User status is updated");
    assert_eq!(json["payload"]["user"]["isAdmin"], true);

    let (status, _, resp) = send_raw(addr, "PUT", "/users/updateBan/ghost", auth, None).await;
    assert_eq!(status, 404);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "User not found with this user name ghost"
    );

    let (status, _, resp) = send_raw(addr, "DELETE", "/users/carl", auth, None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "Single user deleted");
    assert_eq!(json["payload"]["user"]["userName"], "carl");

    let (status, _, resp) = send_raw(addr, "GET", "/users/carl", auth, None).await;
    assert_eq!(status, 404);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "User not found with this user name: carl"
    );
}

#[tokio::test]
async fn profile_update_renames_and_stores_an_avatar() {
    let tmp = tempdir().expect("tempdir");
    let (state, _) = test_state(&tmp);
    seed_account(&state, "Carl", "carl", "carl@example.com", false);
    let addr = spawn_server(state).await;
    let cookie = login(addr, "carl@example.com").await;

    let boundary = "vitrine-profile-boundary";
    let content_type = format!("multipart/form-data; boundary={boundary}");
    let form = format!(
        "--{boundary}\r\ncontent-disposition: form-data; name=\"firstName\"\r\n\r\nGreta\r\n\
         --{boundary}\r\ncontent-disposition: form-data; name=\"image\"; filename=\"avatar.png\"\r\ncontent-type: image/png\r\n\r\nfake image bytes\r\n\
         --{boundary}--\r\n"
    );
    let (status, _, resp) = send_raw(
        addr,
        "PUT",
        "/users/user/profile",
        &[("Cookie", &cookie)],
        Some((&content_type, &form)),
    )
    .await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "User profile updated");
    assert_eq!(json["payload"]["user"]["firstName"], "Greta");
    let image = json["payload"]["user"]["image"].as_str().expect("image");
    assert!(image.starts_with("public/images/users/"));
    assert!(image.ends_with("-avatar.png"));

    let (status, _, resp) = send_raw(
        addr,
        "GET",
        "/users/user/profile",
        &[("Cookie", &cookie)],
        None,
    )
    .await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["payload"]["user"]["firstName"], "Greta");
    assert_eq!(json["payload"]["user"]["lastName"], "Tester");
}

#[tokio::test]
async fn order_lifecycle_from_placement_to_deletion() {
    let tmp = tempdir().expect("tempdir");
    let (state, _) = test_state(&tmp);
    seed_account(&state, "Olga", "olga", "olga@example.com", true);
    seed_account(&state, "Carl", "carl", "carl@example.com", false);
    let (mouse, cable) = seed_catalog(&state);
    let addr = spawn_server(state).await;
    let customer = login(addr, "carl@example.com").await;
    let customer_auth: &[(&str, &str)] = &[("Cookie", &customer)];

    let (status, _, resp) = send_raw(addr, "GET", "/orders/user", customer_auth, None).await;
    assert_eq!(status, 404);
    assert!(json_of(&resp)["error"]["message"]
        .as_str()
        .expect("message")
        .starts_with("There are no orders for this user ID: "));

    let order_body = format!(
        r#"{{"orderItems":[{{"product":{mouse},"qty":2}},{{"product":{cable},"qty":1}}]}}"#
    );
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/orders",
        customer_auth,
        Some(("application/json", &order_body)),
    )
    .await;
    assert_eq!(status, 201);
    let json = json_of(&resp);
    assert_eq!(json["message"], "Order placed successfully, and stock updated");
    let order = &json["payload"]["order"];
    assert_eq!(order["amount"], 60.0);
    assert_eq!(order["totalProducts"], 3);
    assert_eq!(order["status"], "Not Processed");
    assert_eq!(order["buyer"]["userName"], "carl");
    assert_eq!(order["orderItems"][0]["qty"], 2);
    let order_id = order["id"].as_i64().expect("order id");

    let (status, _, resp) = send_raw(addr, "GET", "/products/gaming-mouse", &[], None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["payload"]["product"]["quantity"], 8);
    assert_eq!(json["payload"]["product"]["sold"], 2);

    let (status, _, resp) = send_raw(addr, "GET", "/orders/user", customer_auth, None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "Orders returned");
    assert_eq!(json["payload"]["orders"].as_array().expect("orders").len(), 1);
    assert!(json["payload"].get("currentPage").is_none());

    let admin = login(addr, "olga@example.com").await;
    let admin_auth: &[(&str, &str)] = &[("Cookie", &admin)];

    let (status, _, resp) = send_raw(addr, "GET", "/orders", admin_auth, None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "Orders returned");
    assert_eq!(json["payload"]["currentPage"], 1);

    let order_path = format!("/orders/{order_id}");
    let (status, _, resp) = send_raw(addr, "GET", &order_path, admin_auth, None).await;
    assert_eq!(status, 200);
    assert_eq!(json_of(&resp)["message"], "Order returned");

    let (status, _, resp) = send_raw(
        addr,
        "PUT",
        &order_path,
        admin_auth,
        Some(("application/json", r#"{"status":"Shipped"}"#)),
    )
    .await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "Order status updated successfully");
    assert_eq!(json["payload"]["order"]["status"], "Shipped");

    let (status, _, resp) = send_raw(
        addr,
        "PUT",
        &order_path,
        admin_auth,
        Some(("application/json", r#"{"status":"Returned"}"#)),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(json_of(&resp)["error"]["code"], "validation_failed");

    let (status, _, resp) = send_raw(addr, "DELETE", &order_path, admin_auth, None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["message"], "Order deleted");
    assert!(json.get("payload").is_none());

    let (status, _, resp) = send_raw(addr, "GET", &order_path, admin_auth, None).await;
    assert_eq!(status, 404);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        format!("Order not found with this id: {order_id}")
    );

    let (status, _, resp) = send_raw(addr, "GET", "/orders/abc", admin_auth, None).await;
    assert_eq!(status, 404);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "Order not found with this id: abc"
    );
}

#[tokio::test]
async fn order_placement_rejects_bad_lines_without_touching_stock() {
    let tmp = tempdir().expect("tempdir");
    let (state, _) = test_state(&tmp);
    seed_account(&state, "Carl", "carl", "carl@example.com", false);
    let (mouse, _cable) = seed_catalog(&state);
    let addr = spawn_server(state).await;
    let cookie = login(addr, "carl@example.com").await;
    let auth: &[(&str, &str)] = &[("Cookie", &cookie)];

    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/orders",
        auth,
        Some(("application/json", r#"{"orderItems":[]}"#)),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(json_of(&resp)["error"]["message"], "Order items are required");

    let body = format!(r#"{{"orderItems":[{{"product":{mouse},"qty":0}}]}}"#);
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/orders",
        auth,
        Some(("application/json", &body)),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "Quantity must be positve number"
    );

    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/orders",
        auth,
        Some(("application/json", r#"{"orderItems":[{"product":999,"qty":1}]}"#)),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(
        json_of(&resp)["error"]["message"],
        "Product not found with this id: 999"
    );

    // One good line and one oversized line roll back together.
    let body = format!(
        r#"{{"orderItems":[{{"product":{mouse},"qty":2}},{{"product":{mouse},"qty":9}}]}}"#
    );
    let (status, _, resp) = send_raw(
        addr,
        "POST",
        "/orders",
        auth,
        Some(("application/json", &body)),
    )
    .await;
    assert_eq!(status, 404);
    let json = json_of(&resp);
    assert_eq!(json["error"]["code"], "insufficient_stock");
    assert_eq!(
        json["error"]["message"],
        format!("Not enough stock of product with this id: {mouse}")
    );

    let (status, _, resp) = send_raw(addr, "GET", "/products/gaming-mouse", &[], None).await;
    assert_eq!(status, 200);
    let json = json_of(&resp);
    assert_eq!(json["payload"]["product"]["quantity"], 10);
    assert_eq!(json["payload"]["product"]["sold"], 0);
}
