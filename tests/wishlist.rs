mod common;

use common::{spawn_app, SELLER};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn in_wishlist(app: &common::TestApp, token: &str, slug: &str) -> bool {
    let body: Value = app
        .get(&format!("/api/wishlist/check/{slug}"), token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["in_wishlist"].as_bool().unwrap()
}

#[tokio::test]
async fn test_add_check_and_remove() {
    let app = spawn_app().await;
    let detail = app
        .published_listing("Denim Jacket", json!([{ "size": "M", "stock": 1 }]))
        .await;
    let slug = detail["product"]["slug"].as_str().unwrap().to_string();
    let buyer = app.register("buyer@campus.local").await;

    assert!(!in_wishlist(&app, &buyer, &slug).await);

    let response = app
        .post(&format!("/api/wishlist/add/{slug}"), &buyer)
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["HX-Trigger"], "wishlist-updated");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    let entry_id = body["id"].as_i64().unwrap();

    let body: Value = app
        .post(&format!("/api/wishlist/add/{slug}"), &buyer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], false);
    assert!(in_wishlist(&app, &buyer, &slug).await);

    let list: Value = app
        .get("/api/wishlist", &buyer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = list["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product"]["slug"], slug.as_str());

    // Someone else cannot remove it.
    let seller = app.login_seeded(SELLER).await;
    let response = app
        .delete(&format!("/api/wishlist/{entry_id}"), &seller)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .delete(&format!("/api/wishlist/{entry_id}"), &buyer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!in_wishlist(&app, &buyer, &slug).await);
}

#[tokio::test]
async fn test_unknown_or_hidden_product() {
    let app = spawn_app().await;
    let buyer = app.register("buyer@campus.local").await;
    let response = app
        .post("/api/wishlist/add/nothing-here", &buyer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let seller = app.login_seeded(SELLER).await;
    let pending = app.create_listing(&seller, "Pending Coat", json!([])).await;
    let response = app
        .post(
            &format!("/api/wishlist/add/{}", pending["slug"].as_str().unwrap()),
            &buyer,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
