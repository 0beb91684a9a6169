//! HTTP tests - admin API, public product page and the payment link flow

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::*;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response should be valid JSON")
    };
    (status, json)
}

fn app_with_order() -> (Router, AppState, Product, Order) {
    let state = create_test_app_state();
    let (product, order) = {
        let conn = state.db.get().unwrap();
        let product = create_test_product(&conn, "Contract Pack", 9900);
        let order = create_test_order(&conn, &product);
        (product, order)
    };
    (test_app(state.clone()), state, product, order)
}

#[tokio::test]
async fn test_health() {
    let app = test_app(create_test_app_state());
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_admin_create_product_and_view_public_page() {
    let app = test_app(create_test_app_state());

    let (status, product) = send(
        &app,
        "POST",
        "/admin/products",
        Some(json!({ "name": "Contract Pack", "price_cents": 9900, "usage_days": 365 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let url_code = product["url_code"].as_str().unwrap().to_string();
    let id = product["id"].as_str().unwrap().to_string();

    let (status, public) = send(&app, "GET", &format!("/product/{}", url_code), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["name"], "Contract Pack");
    assert_eq!(public["price_cents"], 9900);
    assert!(public.get("view_count").is_none());

    send(&app, "GET", &format!("/product/{}", url_code), None).await;

    let (_, stored) = send(&app, "GET", &format!("/admin/products/{}", id), None).await;
    assert_eq!(stored["view_count"], 2);
}

#[tokio::test]
async fn test_admin_rejects_invalid_product() {
    let app = test_app(create_test_app_state());

    let (status, json) = send(
        &app,
        "POST",
        "/admin/products",
        Some(json!({ "name": "ab", "price_cents": 9900 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Bad request");

    let (status, _) = send(
        &app,
        "POST",
        "/admin/products",
        Some(json!({ "name": "Contract Pack", "price_cents": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inactive_product_page_is_not_found() {
    let (app, _state, product, _order) = app_with_order();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/admin/products/{}", product.id),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/product/{}", product.url_code), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_product_code_is_not_found() {
    let app = test_app(create_test_app_state());
    let (status, json) = send(&app, "GET", "/product/2024011510300012345678", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Not found");
}

#[tokio::test]
async fn test_admin_create_order_for_missing_product() {
    let app = test_app(create_test_app_state());

    let (status, _) = send(
        &app,
        "POST",
        "/admin/orders",
        Some(json!({
            "product_id": "missing",
            "buyer_name": "Wang",
            "buyer_phone": "13800138000",
            "buyer_company": "Acme Law"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_json_hides_link_token() {
    let (app, _state, _product, order) = app_with_order();

    send(&app, "POST", &format!("/admin/orders/{}/payment-link", order.id), None).await;
    let (status, json) = send(&app, "GET", &format!("/admin/orders/{}", order.id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.get("payment_link").is_none());
    assert!(json["payment_link_expires_at"].is_i64());
}

#[tokio::test]
async fn test_payment_link_flow() {
    let (app, state, product, order) = app_with_order();

    let (status, link) = send(
        &app,
        "POST",
        &format!("/admin/orders/{}/payment-link", order.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(link["order_number"], order.order_number.as_str());
    let token = link["token"].as_str().unwrap().to_string();
    let url = link["url"].as_str().unwrap();
    assert!(url.starts_with("http://localhost:3000/pay?token="));

    let encoded = urlencoding::encode(&token).into_owned();
    let (status, summary) = send(&app, "GET", &format!("/pay?token={}", encoded), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["order_number"], order.order_number.as_str());
    assert_eq!(summary["payment_status"], "pending");
    assert!(summary.get("buyer_phone").is_none());

    let (status, paid) = send(&app, "POST", "/pay/complete", Some(json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["payment_status"], "paid");

    let (status, _) = send(&app, "POST", "/pay/complete", Some(json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let conn = state.db.get().unwrap();
    let product = queries::get_product_by_id(&conn, &product.id).unwrap().unwrap();
    assert_eq!(product.purchase_count, 1);
}

#[tokio::test]
async fn test_pay_error_statuses() {
    let (app, _state, _product, order) = app_with_order();

    let (status, json) = send(&app, "GET", "/pay?token=garbage", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Malformed payment link");

    let (status, json) = send(&app, "GET", "/pay?token=deadbeef:0123456789abcdef", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Payment link invalid or expired");

    let (_, link) = send(
        &app,
        "POST",
        &format!("/admin/orders/{}/payment-link", order.id),
        None,
    )
    .await;
    let token = link["token"].as_str().unwrap().to_string();

    let (status, revoked) = send(
        &app,
        "DELETE",
        &format!("/admin/orders/{}/payment-link", order.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revoked["revoked"], true);

    let encoded = urlencoding::encode(&token).into_owned();
    let (status, json) = send(&app, "GET", &format!("/pay?token={}", encoded), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Payment link already used");

    let (status, _) = send(&app, "GET", "/pay", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_status_transitions() {
    let (app, _state, _product, order) = app_with_order();

    let (status, json) = send(&app, "POST", &format!("/admin/orders/{}/complete", order.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment_status"], "paid");

    let (status, _) = send(&app, "POST", &format!("/admin/orders/{}/complete", order.id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", &format!("/admin/orders/{}/cancel", order.id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/admin/orders/{}/payment-link", order.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/admin/orders/missing/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_list_orders_by_status() {
    let (app, _state, product, order) = app_with_order();
    {
        let (_, second) = send(
            &app,
            "POST",
            "/admin/orders",
            Some(json!({
                "product_id": product.id,
                "buyer_name": "Li",
                "buyer_phone": "13900139000",
                "buyer_company": "Beta Law"
            })),
        )
        .await;
        assert_eq!(second["payment_status"], "pending");
    }
    send(&app, "POST", &format!("/admin/orders/{}/cancel", order.id), None).await;

    let (status, list) = send(&app, "GET", "/admin/orders?status=canceled", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["id"], order.id.as_str());

    let (status, _) = send(&app, "GET", "/admin/orders?status=refunded", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_delete_product_keeps_orders() {
    let (app, _state, product, order) = app_with_order();

    let (status, _) = send(&app, "DELETE", &format!("/admin/products/{}", product.id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", &format!("/admin/orders/{}", order.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["product_id"].is_null());
    assert_eq!(json["product_name"], "Contract Pack");

    let (status, _) = send(&app, "DELETE", &format!("/admin/products/{}", product.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_canceled_order_rejects_completion_and_links() {
    let (app, state, product, order) = app_with_order();

    let (status, json) = send(&app, "POST", &format!("/admin/orders/{}/cancel", order.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment_status"], "canceled");

    let (status, json) = send(&app, "POST", &format!("/admin/orders/{}/complete", order.id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Conflict");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/admin/orders/{}/payment-link", order.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let conn = state.db.get().unwrap();
    let product = queries::get_product_by_id(&conn, &product.id).unwrap().unwrap();
    assert_eq!(product.purchase_count, 0);
}
