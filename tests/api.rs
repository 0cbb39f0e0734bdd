mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::Harness;
use opensase_checkout::api::auth::issue_token;
use opensase_checkout::domain::aggregates::User;
use opensase_checkout::{router, AppState};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn app(h: &Harness) -> Router {
    router(AppState::new(h.repos.clone(), h.queue.clone(), SECRET))
}

fn token(user: &User) -> String {
    issue_token(SECRET, user, chrono::Duration::hours(1)).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token { req = req.header("authorization", format!("Bearer {t}")); }
    let req = match body {
        Some(b) => req.header("content-type", "application/json").body(Body::from(b.to_string())).unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

fn guest_body(variant_id: uuid::Uuid, unit_price: i64) -> Value {
    json!({
        "email": "guest@example.com",
        "name": "Guest Buyer",
        "address": common::ADDRESS,
        "payment_method": "CASH",
        "items": [{ "product_variant_id": variant_id, "product_variant_name": "Widget", "quantity": 2, "unit_price": unit_price, "discount": 0 }]
    })
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let (status, body) = send(&app(&h), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cross_origin_requests_are_allowed() {
    let h = Harness::new();
    let req = Request::builder().uri("/health").header("origin", "https://shop.example.com").body(Body::empty()).unwrap();
    let resp = app(&h).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()), Some("*"));
}

#[tokio::test]
async fn test_guest_checkout_over_http() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await.with_original_price(Decimal::from(70_000));
    let widget = h.save_variant(&widget).await;
    let app = app(&h);

    let (status, body) = send(&app, "POST", "/order", None, Some(guest_body(widget.id, 100_000))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["total_amount"], 269_000);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["email"], "guest@example.com");
    assert!(body["items"][0].get("original_price").is_none());

    let (status, body) = send(&app, "POST", "/order", None, Some(guest_body(widget.id, 90_000))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["message"].as_str().unwrap().contains("prices changed"));
}

#[tokio::test]
async fn test_checkout_rejections_over_http() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let app = app(&h);

    let mut invalid = guest_body(widget.id, 100_000);
    invalid["email"] = json!("not-an-email");
    let (status, body) = send(&app, "POST", "/order", None, Some(invalid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, "POST", "/order", Some("garbage"), Some(guest_body(widget.id, 100_000))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let stranger = User::customer("nobody@example.com", "Nobody", "hash");
    let (status, _) = send(&app, "POST", "/order", Some(&token(&stranger)), Some(guest_body(widget.id, 100_000))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut card = guest_body(widget.id, 100_000);
    card["payment_method"] = json!("CARD");
    let (status, body) = send(&app, "POST", "/order", None, Some(card)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("CARD"));
}

#[tokio::test]
async fn test_cart_then_checkout_and_order_visibility() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await.with_original_price(Decimal::from(70_000));
    let widget = h.save_variant(&widget).await;
    let lan = h.customer("lan@example.com", 0).await;
    let other = h.customer("other@example.com", 0).await;
    let admin = h.admin("admin@example.com").await;
    let (lan_t, other_t, admin_t) = (token(&lan), token(&other), token(&admin));
    let app = app(&h);

    let (status, _) = send(&app, "GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let add = json!({ "product_variant_id": widget.id, "quantity": 1 });
    assert_eq!(send(&app, "POST", "/cart", Some(&lan_t), Some(add.clone())).await.0, StatusCode::CREATED);
    let (status, cart) = send(&app, "POST", "/cart", Some(&lan_t), Some(add)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["items"][0]["quantity"], 2);
    assert_eq!(cart["subtotal"].as_f64(), Some(200_000.0));

    let too_many = json!({ "product_variant_id": widget.id, "quantity": 4 });
    assert_eq!(send(&app, "POST", "/cart", Some(&lan_t), Some(too_many)).await.0, StatusCode::BAD_REQUEST);

    let (status, order) = send(&app, "POST", "/order", Some(&lan_t), Some(json!({ "address": common::ADDRESS, "payment_method": "BANK_TRANSFER" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["user_id"], json!(lan.id));
    assert_eq!(order["payment_status"], "PAID");
    let (_, cart) = send(&app, "GET", "/cart", Some(&lan_t), None).await;
    assert_eq!(cart["cart_id"], Value::Null);

    let uri = format!("/order/{}", order["id"].as_str().unwrap());
    let (status, own) = send(&app, "GET", &uri, Some(&lan_t), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(own["items"][0].get("original_price").is_none());
    assert_eq!(send(&app, "GET", &uri, Some(&other_t), None).await.0, StatusCode::NOT_FOUND);
    let (status, full) = send(&app, "GET", &uri, Some(&admin_t), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(full["items"][0]["original_price"].as_f64(), Some(70_000.0));

    let (_, mine) = send(&app, "GET", "/order/me", Some(&lan_t), None).await;
    assert_eq!(mine["total"], 1);
    let (_, theirs) = send(&app, "GET", "/order/me", Some(&other_t), None).await;
    assert_eq!(theirs["total"], 0);
}

#[tokio::test]
async fn test_admin_order_management() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 0).await;
    let admin = h.admin("admin@example.com").await;
    let (lan_t, admin_t) = (token(&lan), token(&admin));
    let app = app(&h);
    let (_, order) = send(&app, "POST", "/order", None, Some(guest_body(widget.id, 100_000))).await;
    let status_uri = format!("/order/{}/status", order["id"].as_str().unwrap());

    assert_eq!(send(&app, "GET", "/order", None, None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(send(&app, "GET", "/order", Some(&lan_t), None).await.0, StatusCode::FORBIDDEN);
    let (status, page) = send(&app, "GET", "/order?page=1&limit=5", Some(&admin_t), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((page["total"].as_u64(), page["limit"].as_u64()), (Some(1), Some(5)));

    assert_eq!(send(&app, "PATCH", &status_uri, Some(&lan_t), Some(json!({ "status": "SHIPPING" }))).await.0, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, "PATCH", &status_uri, Some(&admin_t), Some(json!({ "status": "FLYING" }))).await;
    assert_eq!((status, body["code"].as_str()), (StatusCode::BAD_REQUEST, Some("VALIDATION_ERROR")));
    let (status, shipped) = send(&app, "PATCH", &status_uri, Some(&admin_t), Some(json!({ "status": "SHIPPING" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["order_tracking"].as_array().map(Vec::len), Some(2));
    let (status, body) = send(&app, "PATCH", &status_uri, Some(&admin_t), Some(json!({ "status": "PENDING" }))).await;
    assert_eq!((status, body["code"].as_str()), (StatusCode::BAD_REQUEST, Some("BAD_REQUEST")));
    let (status, delivered) = send(&app, "PATCH", &status_uri, Some(&admin_t), Some(json!({ "status": "DELIVERED" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["payment_status"], "PAID");

    let (_, found) = send(&app, "GET", "/order/search?status=DELIVERED&customer_name=guest", Some(&admin_t), None).await;
    assert_eq!(found["total"], 1);
    let (_, none) = send(&app, "GET", "/order/search?status=CANCELLED", Some(&admin_t), None).await;
    assert_eq!(none["total"], 0);

    let missing = format!("/order/{}/status", uuid::Uuid::now_v7());
    assert_eq!(send(&app, "PATCH", &missing, Some(&admin_t), Some(json!({ "status": "SHIPPING" }))).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_coupon_endpoints() {
    let h = Harness::new();
    let lan = h.customer("lan@example.com", 0).await;
    let admin = h.admin("admin@example.com").await;
    let (lan_t, admin_t) = (token(&lan), token(&admin));
    let app = app(&h);
    let coupon = json!({ "code": "SAVE5", "discount_amount": 50_000, "usage_limit": 3 });

    assert_eq!(send(&app, "POST", "/coupon", Some(&lan_t), Some(coupon.clone())).await.0, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, "POST", "/coupon", Some(&admin_t), Some(coupon.clone())).await.0, StatusCode::CREATED);
    assert_eq!(send(&app, "POST", "/coupon", Some(&admin_t), Some(coupon)).await.0, StatusCode::CONFLICT);
    let bad_code = json!({ "code": "save", "discount_amount": 1, "usage_limit": 3 });
    assert_eq!(send(&app, "POST", "/coupon", Some(&admin_t), Some(bad_code)).await.0, StatusCode::BAD_REQUEST);
    let bad_limit = json!({ "code": "MANY1", "discount_amount": 1, "usage_limit": 11 });
    assert_eq!(send(&app, "POST", "/coupon", Some(&admin_t), Some(bad_limit)).await.0, StatusCode::BAD_REQUEST);

    let (status, view) = send(&app, "GET", "/coupon/SAVE5", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((view["remaining_uses"].as_i64(), view["is_active"].as_bool()), (Some(3), Some(true)));
    assert_eq!(send(&app, "GET", "/coupon/NONE1", None, None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_cart() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 0).await;
    h.fill_cart(&lan, &[(&widget, 1)]).await;
    let lan_t = token(&lan);
    let app = app(&h);

    assert_eq!(send(&app, "DELETE", "/cart/clear", Some(&lan_t), None).await.0, StatusCode::NO_CONTENT);
    let (_, cart) = send(&app, "GET", "/cart", Some(&lan_t), None).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
}
