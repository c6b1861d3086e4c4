use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::patch,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::api::user::orders::OrderView;
use crate::entities::{
    order::{self, Status},
    order_item, user,
};
use crate::middleware::logging::ApiError;

pub fn orders_router() -> Router {
    Router::new().route("/orders/:id/status", patch(patch_status))
}

async fn patch_status(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(staff): Extension<user::Model>,
    Json(payload): Json<PatchStatus>,
) -> Result<impl IntoResponse, ApiError> {
    let order = order::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No order with {id} id was found")))?;

    let current = order.status;
    if !current.can_transition_to(payload.status) {
        return Err(ApiError::Conflict(format!(
            "Cannot move an order from {current} to {}",
            payload.status
        )));
    }

    let mut active: order::ActiveModel = order.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now());
    let order = active.update(&*db).await?;
    info!(
        order_code = %order.order_code,
        from = %current,
        to = %order.status,
        staff_id = staff.id,
        "Order status changed"
    );

    let items = order.find_related(order_item::Entity).all(&*db).await?;
    Ok(Json(OrderView::new(order, items)))
}

#[derive(Debug, Deserialize)]
struct PatchStatus {
    status: Status,
}
