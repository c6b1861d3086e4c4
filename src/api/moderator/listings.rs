use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::api::ajax;
use crate::entities::{
    category, product,
    product_moderation::{self, ModerationStatus},
    product_size, size, user,
};
use crate::middleware::{htmx::HxRequest, logging::ApiError};
use crate::services::{
    chat::Participant,
    moderation::{approve_listing, reject_listing},
};

const RECENT_PENDING: u64 = 5;

pub fn listings_router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/listings", get(get_listings))
        .route("/listings/:product_id", get(get_listing))
        .route("/approve/:product_id", post(approve))
        .route("/reject/:product_id", post(reject))
}

#[derive(Debug, Serialize)]
struct QueueEntry {
    moderation: product_moderation::Model,
    product: product::Model,
}

fn queue_entries(
    rows: Vec<(product_moderation::Model, Option<product::Model>)>,
) -> Vec<QueueEntry> {
    rows.into_iter()
        .filter_map(|(moderation, product)| {
            product.map(|product| QueueEntry {
                moderation,
                product,
            })
        })
        .collect()
}

async fn count_with_status(
    db: &DatabaseConnection,
    status: ModerationStatus,
) -> Result<u64, ApiError> {
    Ok(product_moderation::Entity::find()
        .filter(product_moderation::Column::Status.eq(status))
        .count(db)
        .await?)
}

async fn dashboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let pending = count_with_status(&db, ModerationStatus::Pending).await?;
    let approved = count_with_status(&db, ModerationStatus::Approved).await?;
    let rejected = count_with_status(&db, ModerationStatus::Rejected).await?;

    let recent = product_moderation::Entity::find()
        .filter(product_moderation::Column::Status.eq(ModerationStatus::Pending))
        .order_by_desc(product_moderation::Column::CreatedAt)
        .order_by_desc(product_moderation::Column::Id)
        .limit(RECENT_PENDING)
        .find_also_related(product::Entity)
        .all(&*db)
        .await?;

    Ok(Json(json!({
        "pending": pending,
        "approved": approved,
        "rejected": rejected,
        "recent_pending": queue_entries(recent),
    })))
}

/// Newest first: pending by submission time, decided ones by moderation time.
async fn get_listings(
    Query(params): Query<ListingsQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let status = params.status.unwrap_or(ModerationStatus::Pending);
    let query = product_moderation::Entity::find()
        .filter(product_moderation::Column::Status.eq(status));
    let query = if status.is_terminal() {
        query.order_by_desc(product_moderation::Column::ModeratedAt)
    } else {
        query.order_by_desc(product_moderation::Column::CreatedAt)
    };

    let rows = query
        .order_by_desc(product_moderation::Column::Id)
        .find_also_related(product::Entity)
        .all(&*db)
        .await?;
    Ok(Json(json!({
        "status": status,
        "items": queue_entries(rows),
    })))
}

async fn get_listing(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let (moderation, product) = product_moderation::Entity::find()
        .filter(product_moderation::Column::ProductId.eq(product_id))
        .find_also_related(product::Entity)
        .one(&*db)
        .await?
        .and_then(|(moderation, product)| product.map(|product| (moderation, product)))
        .ok_or_else(|| {
            ApiError::NotFound(format!("No listing with {product_id} id was found"))
        })?;

    let category = category::Entity::find_by_id(product.category_id)
        .one(&*db)
        .await?;
    let owner = match product.owner_id {
        Some(owner_id) => user::Entity::find_by_id(owner_id)
            .one(&*db)
            .await?
            .map(Participant::from),
        None => None,
    };
    let sizes: Vec<_> = product_size::Entity::find()
        .filter(product_size::Column::ProductId.eq(product.id))
        .find_also_related(size::Entity)
        .order_by_asc(product_size::Column::Id)
        .all(&*db)
        .await?
        .into_iter()
        .map(|(row, size)| {
            json!({
                "product_size_id": row.id,
                "size": size.map(|size| size.name).unwrap_or_default(),
                "stock": row.stock,
            })
        })
        .collect();

    Ok(Json(json!({
        "moderation": moderation,
        "product": product,
        "category": category,
        "owner": owner,
        "sizes": sizes,
    })))
}

async fn approve(
    hx: HxRequest,
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(moderator): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = approve_listing(&db, moderator.id, product_id).await?;
    let message = if outcome.published {
        format!("'{}' approved and published", outcome.product.name)
    } else {
        format!(
            "'{}' approved but stays hidden until it has stock",
            outcome.product.name
        )
    };
    Ok(hx.trigger(
        "moderation-updated",
        ajax(
            true,
            message,
            json!({ "published": outcome.published, "moderation": outcome.moderation }),
        ),
    ))
}

async fn reject(
    hx: HxRequest,
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(moderator): Extension<user::Model>,
    Json(payload): Json<RejectListing>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let reason = payload.rejection_reason.trim().to_owned();
    let outcome = reject_listing(&db, moderator.id, product_id, reason).await?;
    Ok(hx.trigger(
        "moderation-updated",
        ajax(
            true,
            format!("'{}' rejected", outcome.product.name),
            json!({ "moderation": outcome.moderation }),
        ),
    ))
}

#[derive(Debug, Deserialize)]
struct ListingsQuery {
    status: Option<ModerationStatus>,
}

#[derive(Debug, Deserialize, Validate)]
struct RejectListing {
    #[serde(default)]
    #[validate(length(max = 1000))]
    rejection_reason: String,
}
