use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api::ajax;
use crate::entities::{
    product,
    product_moderation::{self, ModerationStatus},
    user,
};
use crate::middleware::{htmx::HxRequest, logging::ApiError};
use crate::services::listing::{create_listing, toggle_listing, NewListing};

pub fn listing_router() -> Router {
    Router::new()
        .route("/listing", get(get_listings).post(post_listing))
        .route("/listing/:id", delete(delete_listing))
        .route("/listing/:id/toggle", post(toggle))
}

#[derive(Debug, Serialize)]
struct ListingEntry {
    #[serde(flatten)]
    product: product::Model,
    moderation_status: Option<ModerationStatus>,
    rejection_reason: Option<String>,
}

async fn get_listings(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let listings = product::Entity::find()
        .filter(product::Column::OwnerId.eq(user.id))
        .order_by_desc(product::Column::CreatedAt)
        .order_by_desc(product::Column::Id)
        .find_also_related(product_moderation::Entity)
        .all(&*db)
        .await?;

    let (active, inactive): (Vec<ListingEntry>, Vec<ListingEntry>) = listings
        .into_iter()
        .map(|(product, moderation)| ListingEntry {
            product,
            moderation_status: moderation.as_ref().map(|moderation| moderation.status),
            rejection_reason: moderation.and_then(|moderation| moderation.rejection_reason),
        })
        .partition(|entry| entry.product.is_active);

    Ok(Json(json!({
        "active": active,
        "inactive": inactive,
    })))
}

async fn post_listing(
    hx: HxRequest,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
    Json(mut payload): Json<NewListing>,
) -> Result<impl IntoResponse, ApiError> {
    payload.normalize();
    payload.validate()?;

    let txn = db.begin().await?;
    let product = match create_listing(&txn, user.id, payload).await {
        Ok(product) => {
            txn.commit().await?;
            product
        }
        Err(err) => {
            let _ = txn.rollback().await;
            return Err(err.into());
        }
    };

    Ok(hx.trigger(
        "listings-updated",
        (
            StatusCode::CREATED,
            ajax(
                true,
                "Listing submitted for moderation",
                json!({ "product": product }),
            ),
        ),
    ))
}

async fn delete_listing(
    hx: HxRequest,
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let product = product::Entity::find_by_id(id)
        .filter(product::Column::OwnerId.eq(user.id))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No listing with {id} id was found")))?;

    let slug = product.slug.clone();
    product.delete(&*db).await?;
    info!(product_id = id, slug = %slug, owner_id = user.id, "Listing deleted");

    Ok(hx.trigger("listings-updated", ajax(true, "Listing deleted", json!({}))))
}

async fn toggle(
    hx: HxRequest,
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let product = toggle_listing(&*db, user.id, id).await?;
    let message = if product.is_active {
        "Listing is now visible"
    } else {
        "Listing is now hidden"
    };
    Ok(hx.trigger(
        "listings-updated",
        ajax(true, message, json!({ "is_active": product.is_active })),
    ))
}
