mod common;

use common::{spawn_app, ADMIN, MODERATOR, SELLER};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_approve_publishes_listing() {
    let app = spawn_app().await;
    let seller = app.login_seeded(SELLER).await;
    let moderator = app.login_seeded(MODERATOR).await;
    let product = app
        .create_listing(&seller, "Denim Jacket", json!([{ "size": "M", "stock": 2 }]))
        .await;
    let id = product["id"].as_i64().unwrap();

    let body = app.approve(&moderator, id).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["published"], true);
    assert_eq!(body["moderation"]["status"], "approved");
    assert!(body["moderation"]["moderated_at"].is_string());

    let response = app
        .post(&format!("/api/moderator/approve/{id}"), &moderator)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .post(&format!("/api/moderator/reject/{id}"), &moderator)
        .json(&json!({ "rejection_reason": "Changed my mind" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_approving_empty_listing_keeps_it_hidden() {
    let app = spawn_app().await;
    let seller = app.login_seeded(SELLER).await;
    let admin = app.login_seeded(ADMIN).await;
    let product = app
        .create_listing(&seller, "Sold Out Cap", json!([{ "size": "One Size", "stock": 0 }]))
        .await;

    let body = app.approve(&admin, product["id"].as_i64().unwrap()).await;
    assert_eq!(body["published"], false);

    let response = app
        .post(&format!("/api/listing/{}/toggle", product["id"]), &seller)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reject_records_reason() {
    let app = spawn_app().await;
    let seller = app.login_seeded(SELLER).await;
    let moderator = app.login_seeded(MODERATOR).await;
    let product = app
        .create_listing(&seller, "Blurry Boots", json!([{ "size": "M", "stock": 1 }]))
        .await;
    let id = product["id"].as_i64().unwrap();

    let response = app
        .post(&format!("/api/moderator/reject/{id}"), &moderator)
        .header("HX-Request", "true")
        .json(&json!({ "rejection_reason": "Photos are blurry" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["HX-Trigger"], "moderation-updated");

    let listings: Value = app
        .get("/api/listing", &seller)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let inactive = listings["inactive"].as_array().unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0]["moderation_status"], "rejected");
    assert_eq!(inactive[0]["rejection_reason"], "Photos are blurry");

    let response = app
        .post(&format!("/api/listing/{id}/toggle"), &seller)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .post(&format!("/api/moderator/approve/{id}"), &moderator)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_listing() {
    let app = spawn_app().await;
    let moderator = app.login_seeded(MODERATOR).await;
    let response = app
        .post("/api/moderator/approve/9999", &moderator)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .get("/api/moderator/listings/9999", &moderator)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dashboard_and_queues() {
    let app = spawn_app().await;
    let seller = app.login_seeded(SELLER).await;
    let moderator = app.login_seeded(MODERATOR).await;

    let first = app.create_listing(&seller, "First", json!([])).await;
    let second = app.create_listing(&seller, "Second", json!([])).await;
    let third = app.create_listing(&seller, "Third", json!([])).await;
    app.approve(&moderator, third["id"].as_i64().unwrap()).await;

    let dashboard: Value = app
        .get("/api/moderator/dashboard", &moderator)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["pending"], 2);
    assert_eq!(dashboard["approved"], 1);
    assert_eq!(dashboard["rejected"], 0);
    assert_eq!(dashboard["recent_pending"][0]["product"]["id"], second["id"]);

    let queue: Value = app
        .get("/api/moderator/listings?status=pending", &moderator)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = queue["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["product"]["id"], second["id"]);
    assert_eq!(items[1]["product"]["id"], first["id"]);

    let approved: Value = app
        .get("/api/moderator/listings?status=approved", &moderator)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(approved["items"][0]["product"]["id"], third["id"]);

    let detail: Value = app
        .get(&format!("/api/moderator/listings/{}", first["id"]), &moderator)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["moderation"]["status"], "pending");
    assert_eq!(detail["owner"]["first_name"], "User");
    assert_eq!(detail["sizes"][0]["size"], "One Size");
}

#[tokio::test]
async fn test_owner_toggles_approved_listing() {
    let app = spawn_app().await;
    let seller = app.login_seeded(SELLER).await;
    let moderator = app.login_seeded(MODERATOR).await;
    let product = app
        .create_listing(&seller, "Denim Jacket", json!([{ "size": "M", "stock": 2 }]))
        .await;
    let id = product["id"].as_i64().unwrap();
    app.approve(&moderator, id).await;

    let response = app
        .post(&format!("/api/listing/{id}/toggle"), &seller)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["is_active"], false);

    let response = app
        .post(&format!("/api/listing/{id}/toggle"), &seller)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["is_active"], true);

    let stranger = app.register("stranger@campus.local").await;
    let response = app
        .post(&format!("/api/listing/{id}/toggle"), &stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owner_deletes_listing() {
    let app = spawn_app().await;
    let seller = app.login_seeded(SELLER).await;
    let product = app.create_listing(&seller, "Old Bag", json!([])).await;
    let id = product["id"].as_i64().unwrap();

    let stranger = app.register("stranger@campus.local").await;
    let response = app
        .delete(&format!("/api/listing/{id}"), &stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .delete(&format!("/api/listing/{id}"), &seller)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listings: Value = app
        .get("/api/listing", &seller)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listings["active"].as_array().unwrap().is_empty());
    assert!(listings["inactive"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_stock_and_size_names_are_checked() {
    let app = spawn_app().await;
    let seller = app.login_seeded(SELLER).await;
    let listing = |sizes: Value| {
        json!({
            "name": "Denim Jacket",
            "category_id": 1,
            "color": "blue",
            "price_cents": 2500,
            "sizes": sizes,
        })
    };

    let response = app
        .post("/api/listing", &seller)
        .json(&listing(json!([
            { "size": "M", "stock": 2147483647 },
            { "size": "L", "stock": 1 },
        ])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post("/api/listing", &seller)
        .json(&listing(json!([{ "size": "   ", "stock": 1 }])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let listings: Value = app
        .get("/api/listing", &seller)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listings["inactive"].as_array().unwrap().is_empty());

    let response = app
        .post("/api/listing", &seller)
        .json(&listing(json!([
            { "size": " M ", "stock": 100000 },
            { "size": "L", "stock": 100000 },
        ])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["product"]["total_stock"], 200000);
}
