use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::json;
use std::sync::Arc;

use crate::api::ajax;
use crate::entities::{product, user, wishlist};
use crate::middleware::{htmx::HxRequest, logging::ApiError};

pub fn wishlist_router() -> Router {
    Router::new()
        .route("/wishlist", get(get_wishlist))
        .route("/wishlist/add/:slug", post(add_to_wishlist))
        .route("/wishlist/:id", delete(remove_from_wishlist))
        .route("/wishlist/check/:slug", get(check_wishlist))
}

async fn product_by_slug(db: &DatabaseConnection, slug: &str) -> Result<product::Model, ApiError> {
    product::Entity::find()
        .filter(product::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product '{slug}' was found")))
}

async fn find_entry(
    db: &DatabaseConnection,
    user_id: i32,
    product_id: i32,
) -> Result<Option<wishlist::Model>, ApiError> {
    Ok(wishlist::Entity::find()
        .filter(wishlist::Column::UserId.eq(user_id))
        .filter(wishlist::Column::ProductId.eq(product_id))
        .one(db)
        .await?)
}

async fn get_wishlist(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let items: Vec<_> = wishlist::Entity::find()
        .filter(wishlist::Column::UserId.eq(user.id))
        .order_by_desc(wishlist::Column::AddedAt)
        .order_by_desc(wishlist::Column::Id)
        .find_also_related(product::Entity)
        .all(&*db)
        .await?
        .into_iter()
        .filter_map(|(entry, product)| {
            product.map(|product| {
                json!({
                    "id": entry.id,
                    "added_at": entry.added_at,
                    "product": product,
                })
            })
        })
        .collect();
    Ok(Json(json!({ "items": items })))
}

async fn add_to_wishlist(
    hx: HxRequest,
    Path(slug): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let product = product_by_slug(&db, &slug).await?;
    if !product.is_active {
        return Err(ApiError::NotFound(format!("No product '{slug}' was found")));
    }

    if find_entry(&db, user.id, product.id).await?.is_some() {
        return Ok(hx.trigger(
            "wishlist-updated",
            ajax(false, "Already in your wishlist", json!({})),
        ));
    }

    let entry = wishlist::ActiveModel {
        user_id: Set(user.id),
        product_id: Set(product.id),
        added_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&*db)
    .await?;

    Ok(hx.trigger(
        "wishlist-updated",
        ajax(true, "Added to wishlist", json!({ "id": entry.id })),
    ))
}

async fn remove_from_wishlist(
    hx: HxRequest,
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = wishlist::Entity::find_by_id(id)
        .filter(wishlist::Column::UserId.eq(user.id))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No wishlist entry with {id} id was found")))?;
    entry.delete(&*db).await?;

    Ok(hx.trigger(
        "wishlist-updated",
        ajax(true, "Removed from wishlist", json!({})),
    ))
}

async fn check_wishlist(
    Path(slug): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let product = product_by_slug(&db, &slug).await?;
    let in_wishlist = find_entry(&db, user.id, product.id).await?.is_some();
    Ok(Json(json!({ "in_wishlist": in_wishlist })))
}
