mod common;

use common::{new_client, size_id, spawn_app, SELLER};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_session_cookie_is_issued() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api/cart"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.cookies().any(|cookie| cookie.name() == "session_id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_items"], 0);
}

#[tokio::test]
async fn test_add_merges_same_size() {
    let app = spawn_app().await;
    let detail = app
        .published_listing("Denim Jacket", json!([{ "size": "M", "stock": 5 }]))
        .await;
    let product_id = detail["product"]["id"].as_i64().unwrap();
    let m = size_id(&detail, "M");

    let response = app.add_to_cart(product_id, m, 1).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    app.add_to_cart(product_id, m, 2).await;
    let cart = app.cart().await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["quantity"], 3);
    assert_eq!(cart["total_items"], 3);
    assert_eq!(cart["total_price_cents"], 3 * 2500);
}

#[tokio::test]
async fn test_merged_line_stays_within_limit() {
    let app = spawn_app().await;
    let detail = app
        .published_listing("Denim Jacket", json!([{ "size": "M", "stock": 5 }]))
        .await;
    let product_id = detail["product"]["id"].as_i64().unwrap();
    let m = size_id(&detail, "M");

    assert_eq!(app.add_to_cart(product_id, m, 60).await.status(), StatusCode::CREATED);
    let response = app.add_to_cart(product_id, m, 60).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.cart().await["total_items"], 60);

    assert_eq!(app.add_to_cart(product_id, m, 39).await.status(), StatusCode::CREATED);
    assert_eq!(app.cart().await["total_items"], 99);
}

#[tokio::test]
async fn test_carts_are_per_session() {
    let app = spawn_app().await;
    let detail = app
        .published_listing("Denim Jacket", json!([{ "size": "M", "stock": 5 }]))
        .await;
    app.add_to_cart(detail["product"]["id"].as_i64().unwrap(), size_id(&detail, "M"), 1)
        .await;

    let other: Value = new_client()
        .get(app.url("/api/cart"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(other["total_items"], 0);
}

#[tokio::test]
async fn test_add_rejects_hidden_products_and_foreign_sizes() {
    let app = spawn_app().await;
    let seller = app.login_seeded(SELLER).await;
    let pending = app.create_listing(&seller, "Pending Coat", json!([])).await;
    let response = app
        .add_to_cart(pending["id"].as_i64().unwrap(), 1, 1)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let jacket = app
        .published_listing("Denim Jacket", json!([{ "size": "M", "stock": 5 }]))
        .await;
    let shirt = app
        .published_listing("Linen Shirt", json!([{ "size": "S", "stock": 5 }]))
        .await;
    let response = app
        .add_to_cart(
            jacket["product"]["id"].as_i64().unwrap(),
            size_id(&shirt, "S"),
            1,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .add_to_cart(jacket["product"]["id"].as_i64().unwrap(), size_id(&jacket, "M"), 0)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_remove_and_clear() {
    let app = spawn_app().await;
    let detail = app
        .published_listing(
            "Denim Jacket",
            json!([{ "size": "M", "stock": 5 }, { "size": "L", "stock": 5 }]),
        )
        .await;
    let product_id = detail["product"]["id"].as_i64().unwrap();
    app.add_to_cart(product_id, size_id(&detail, "M"), 1).await;
    app.add_to_cart(product_id, size_id(&detail, "L"), 1).await;

    let cart = app.cart().await;
    let first = cart["items"][0]["id"].as_i64().unwrap();
    assert_eq!(cart["items"][1]["size_name"], "L");

    let response = app
        .client
        .patch(app.url(&format!("/api/cart/{first}")))
        .json(&json!({ "quantity": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.cart().await["total_items"], 5);

    let response = app
        .client
        .patch(app.url(&format!("/api/cart/{first}")))
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Removed from cart");
    assert_eq!(app.cart().await["items"].as_array().unwrap().len(), 1);

    let response = app
        .client
        .delete(app.url(&format!("/api/cart/{first}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.add_to_cart(product_id, size_id(&detail, "M"), 2).await;
    let response = app
        .client
        .delete(app.url("/api/cart"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["removed"], 2);
    assert_eq!(app.cart().await["total_items"], 0);
}

#[tokio::test]
async fn test_htmx_requests_get_trigger_header() {
    let app = spawn_app().await;
    let detail = app
        .published_listing("Denim Jacket", json!([{ "size": "M", "stock": 5 }]))
        .await;
    let payload = json!({
        "product_id": detail["product"]["id"],
        "product_size_id": size_id(&detail, "M"),
    });

    let response = app
        .client
        .post(app.url("/api/cart"))
        .header("HX-Request", "true")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["HX-Trigger"], "cart-updated");

    let response = app
        .client
        .post(app.url("/api/cart"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert!(response.headers().get("HX-Trigger").is_none());
}
