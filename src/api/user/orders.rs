use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Iterable, ModelTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::api::ajax;
use crate::entities::{
    order::{self, DeliveryAddress},
    order_item, user,
};
use crate::middleware::{htmx::HxRequest, logging::ApiError, session::Session};
use crate::services::{
    cart::{find_cart, load_lines, CartView},
    checkout::{place_order, CheckoutError, CheckoutForm},
};

pub fn orders_router() -> Router {
    Router::new()
        .route("/orders/checkout", get(checkout_preview).post(checkout))
        .route("/orders", get(get_orders))
        .route("/orders/:id", get(get_order))
}

/// Cart summary plus a form prefilled from the profile.
async fn checkout_preview(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let lines = match find_cart(&*db, &session.key).await? {
        Some(cart) => load_lines(&*db, cart.id).await?,
        None => Vec::new(),
    };
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }

    let delivery_addresses: Vec<_> = DeliveryAddress::iter()
        .map(|address| json!({ "value": address, "label": address.full_text() }))
        .collect();

    Ok(Json(json!({
        "cart": CartView::new(&lines),
        "form": {
            "first_name": user.first_name,
            "last_name": user.last_name,
            "patronymic": "",
            "phone": user.phone,
            "delivery_address": DeliveryAddress::Address1,
            "group_number": "",
            "special_instructions": "",
        },
        "delivery_addresses": delivery_addresses,
    })))
}

async fn checkout(
    hx: HxRequest,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
    Extension(session): Extension<Session>,
    Json(form): Json<CheckoutForm>,
) -> Result<impl IntoResponse, ApiError> {
    form.validate()?;
    let placed = place_order(&db, &user, &session.key, form).await?;

    let message = format!("Order #{} has been placed", placed.order.order_code);
    Ok(hx.trigger(
        "order-placed",
        (
            StatusCode::CREATED,
            ajax(true, message, json!({ "order": OrderView::new(placed.order, placed.items) })),
        ),
    ))
}

async fn get_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let orders: Vec<OrderView> = order::Entity::find()
        .filter(order::Column::UserId.eq(user.id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .find_with_related(order_item::Entity)
        .all(&*db)
        .await?
        .into_iter()
        .map(|(order, items)| OrderView::new(order, items))
        .collect();
    Ok(Json(orders))
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let order = order::Entity::find_by_id(id)
        .filter(order::Column::UserId.eq(user.id))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No order with {id} id was found")))?;
    let items = order.find_related(order_item::Entity).all(&*db).await?;
    Ok(Json(OrderView::new(order, items)))
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub delivery_address_text: &'static str,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: order_item::Model,
    pub total_price_cents: i64,
}

impl OrderView {
    pub fn new(order: order::Model, items: Vec<order_item::Model>) -> OrderView {
        OrderView {
            delivery_address_text: order.delivery_address.full_text(),
            items: items
                .into_iter()
                .map(|item| OrderItemView {
                    total_price_cents: item.total_price_cents(),
                    item,
                })
                .collect(),
            order,
        }
    }
}
