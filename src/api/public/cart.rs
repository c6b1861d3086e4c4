use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::api::ajax;
use crate::middleware::{htmx::HxRequest, logging::ApiError, session::Session};
use crate::services::cart::{
    add_item, clear_cart, find_cart, load_lines, remove_item, set_quantity, CartView,
};

pub fn cart_router() -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_product).delete(clear))
        .route("/cart/:id", patch(patch_entry).delete(remove_product))
}

async fn cart_view(db: &DatabaseConnection, session: &Session) -> Result<CartView, ApiError> {
    let Some(cart) = find_cart(db, &session.key).await? else {
        return Ok(CartView::empty());
    };
    let lines = load_lines(db, cart.id).await?;
    Ok(CartView::new(&lines))
}

async fn get_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(cart_view(&db, &session).await?))
}

async fn add_product(
    hx: HxRequest,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<AddProduct>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;
    let added = add_item(
        &txn,
        &session.key,
        payload.product_id,
        payload.product_size_id,
        payload.quantity,
    )
    .await;
    let item = match added {
        Ok(item) => {
            txn.commit().await?;
            item
        }
        Err(err) => {
            let _ = txn.rollback().await;
            return Err(err.into());
        }
    };

    let cart = cart_view(&db, &session).await?;
    Ok(hx.trigger(
        "cart-updated",
        (
            StatusCode::CREATED,
            ajax(
                true,
                "Added to cart",
                json!({ "item": item, "total_items": cart.total_items }),
            ),
        ),
    ))
}

async fn patch_entry(
    hx: HxRequest,
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<PatchCart>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;
    let updated = match set_quantity(&txn, &session.key, id, payload.quantity).await {
        Ok(updated) => {
            txn.commit().await?;
            updated
        }
        Err(err) => {
            let _ = txn.rollback().await;
            return Err(err.into());
        }
    };

    let message = match updated {
        Some(_) => "Quantity updated",
        None => "Removed from cart",
    };
    let cart = cart_view(&db, &session).await?;
    Ok(hx.trigger("cart-updated", ajax(true, message, json!({ "cart": cart }))))
}

async fn remove_product(
    hx: HxRequest,
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    if let Err(err) = remove_item(&txn, &session.key, id).await {
        let _ = txn.rollback().await;
        return Err(err.into());
    }
    txn.commit().await?;

    let cart = cart_view(&db, &session).await?;
    Ok(hx.trigger(
        "cart-updated",
        ajax(true, "Removed from cart", json!({ "cart": cart })),
    ))
}

async fn clear(
    hx: HxRequest,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let removed = match clear_cart(&txn, &session.key).await {
        Ok(removed) => {
            txn.commit().await?;
            removed
        }
        Err(err) => {
            let _ = txn.rollback().await;
            return Err(err.into());
        }
    };
    Ok(hx.trigger(
        "cart-updated",
        ajax(true, "Cart cleared", json!({ "removed": removed })),
    ))
}

#[derive(Debug, Deserialize, Validate)]
struct AddProduct {
    product_id: i32,
    product_size_id: i32,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 99))]
    quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
struct PatchCart {
    #[validate(range(min = 0, max = 99))]
    quantity: i32,
}
