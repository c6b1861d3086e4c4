#![allow(dead_code)]

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use uuid::Uuid;

use campus_market::{api::create_api_router, config::AppConfig, init_database};

pub const SEED_PASSWORD: &str = "Secret15";
pub const SELLER: &str = "user@campus.local";
pub const MODERATOR: &str = "moderator@campus.local";
pub const ADMIN: &str = "admin@campus.local";

pub struct TestApp {
    pub address: String,
    pub db: Arc<DatabaseConnection>,
    pub client: Client,
}

/// Starts the full router on a random port over a fresh, seeded SQLite file.
pub async fn spawn_app() -> TestApp {
    let path = std::env::temp_dir().join(format!("campus-market-{}.db", Uuid::new_v4()));
    let config = AppConfig {
        database_url: format!("sqlite://{}?mode=rwc", path.display()),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        secret: "integration-test-secret-value".to_string(),
        token_ttl_hours: 1,
        max_connections: 4,
        seed_database: true,
        seed_password: SEED_PASSWORD.to_string(),
    };

    let db = Arc::new(init_database(&config).await.expect("Failed to prepare database"));
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind test listener");
    let address = format!("http://{}", listener.local_addr().unwrap());

    let app = create_api_router(db.clone(), Arc::new(config));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server crashed");
    });

    TestApp {
        address,
        db,
        client: new_client(),
    }
}

/// A client with its own cookie jar, so its own session and cart.
pub fn new_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn patch(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(token)
    }

    pub fn delete(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "login failed for {email}");
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn login_seeded(&self, email: &str) -> String {
        self.login(email, SEED_PASSWORD).await
    }

    pub async fn register(&self, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/register"))
            .json(&json!({
                "email": email,
                "password": "buyer-password",
                "first_name": "Anna",
                "last_name": "Smirnova",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        self.login(email, "buyer-password").await
    }

    /// Creates a listing as `token` and returns the created product.
    pub async fn create_listing(&self, token: &str, name: &str, sizes: Value) -> Value {
        let response = self
            .post("/api/listing", token)
            .json(&json!({
                "name": name,
                "category_id": 1,
                "color": "blue",
                "description": "Worn twice",
                "condition": "like_new",
                "material": "cotton",
                "brand": "Campus",
                "price_cents": 2500,
                "sizes": sizes,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["product"].clone()
    }

    pub async fn approve(&self, staff_token: &str, product_id: i64) -> Value {
        let response = self
            .post(&format!("/api/moderator/approve/{product_id}"), staff_token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }

    /// A seller listing approved by the moderator. Returns the product detail body.
    pub async fn published_listing(&self, name: &str, sizes: Value) -> Value {
        let seller = self.login_seeded(SELLER).await;
        let moderator = self.login_seeded(MODERATOR).await;
        let product = self.create_listing(&seller, name, sizes).await;
        self.approve(&moderator, product["id"].as_i64().unwrap()).await;
        self.product_detail(product["slug"].as_str().unwrap()).await
    }

    pub async fn product_detail(&self, slug: &str) -> Value {
        let response = self
            .client
            .get(self.url(&format!("/api/product/{slug}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }

    pub async fn add_to_cart(&self, product_id: i64, product_size_id: i64, quantity: i64) -> Response {
        self.client
            .post(self.url("/api/cart"))
            .json(&json!({
                "product_id": product_id,
                "product_size_id": product_size_id,
                "quantity": quantity,
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn cart(&self) -> Value {
        self.client
            .get(self.url("/api/cart"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

/// The `product_size_id` of a named size in a product detail body.
pub fn size_id(detail: &Value, size: &str) -> i64 {
    detail["sizes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["size"] == size)
        .and_then(|entry| entry["product_size_id"].as_i64())
        .unwrap_or_else(|| panic!("no size {size} in {detail}"))
}

pub fn size_stock(detail: &Value, size: &str) -> i64 {
    detail["sizes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["size"] == size)
        .and_then(|entry| entry["stock"].as_i64())
        .unwrap_or_else(|| panic!("no size {size} in {detail}"))
}

pub fn checkout_form() -> Value {
    json!({
        "first_name": "Anna",
        "last_name": "Smirnova",
        "patronymic": "Igorevna",
        "phone": "+7 912 345-67-89",
        "delivery_address": "address_2",
        "group_number": "KE-201",
        "special_instructions": "Call before delivery",
    })
}
