pub mod moderator;
pub mod public;
pub mod user;

use axum::{middleware::from_fn, Extension, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::middleware::{logging::logging_middleware, logging::ApiError, session::session_middleware};
use crate::services::{
    cart::CartError, chat::ChatError, checkout::CheckoutError, listing::ListingError,
    moderation::ModerationError,
};

use moderator::moderator_api_router;
use public::public_api_router;
use user::user_api_router;

pub fn create_api_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .merge(public_api_router())
        .nest("/api", user_api_router(db.clone(), config.clone()))
        .nest("/api/moderator", moderator_api_router(db.clone(), config.clone()))
        .layer(from_fn(session_middleware))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(config))
        .layer(Extension(db))
}

/// Body of the small AJAX endpoints: `{"success": .., "message": ..}` plus any extra fields.
pub(crate) fn ajax(success: bool, message: impl Into<String>, extra: Value) -> Json<Value> {
    let mut body = json!({
        "success": success,
        "message": message.into(),
    });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    Json(body)
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => ApiError::BadRequest(err.to_string()),
            CheckoutError::InsufficientStock { .. } => ApiError::InsufficientStock(err.to_string()),
            CheckoutError::Unavailable { .. } => ApiError::Conflict(err.to_string()),
            CheckoutError::Db(db_err) => ApiError::CheckoutFailed(db_err.to_string()),
        }
    }
}

impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::UnknownCategory(_)
            | ListingError::DuplicateSize(_)
            | ListingError::StockOverflow => {
                ApiError::BadRequest(err.to_string())
            }
            ListingError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ListingError::NotPublishable => ApiError::Conflict(err.to_string()),
            ListingError::Db(db_err) => db_err.into(),
        }
    }
}

impl From<ModerationError> for ApiError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ModerationError::AlreadyModerated(_) => ApiError::Conflict(err.to_string()),
            ModerationError::Db(db_err) => db_err.into(),
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ProductUnavailable(_) | CartError::ItemNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            CartError::SizeMismatch | CartError::QuantityLimit { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            CartError::Db(db_err) => db_err.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound(_) | ChatError::ProductNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ChatError::NoSeller
            | ChatError::OwnListing
            | ChatError::EmptyMessage
            | ChatError::MessageTooLong => ApiError::BadRequest(err.to_string()),
            ChatError::Db(db_err) => db_err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn ajax_merges_extra_fields() {
        let Json(body) = ajax(true, "Added", json!({ "total_items": 3 }));
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Added");
        assert_eq!(body["total_items"], 3);
    }

    #[test]
    fn stock_failures_map_to_conflict() {
        let err: ApiError = CheckoutError::InsufficientStock {
            product: "Hoodie".to_string(),
            size: "M".to_string(),
            requested: 3,
            available: 1,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.public_message().contains("Hoodie"));
    }

    #[test]
    fn database_failure_at_checkout_is_generic() {
        let err: ApiError = CheckoutError::Db(sea_orm::DbErr::Custom("locked".to_string())).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.public_message(),
            "Failed to place the order. Please try again."
        );
    }

    #[test]
    fn terminal_moderation_is_a_conflict() {
        let err: ApiError = ModerationError::AlreadyModerated(
            crate::entities::product_moderation::ModerationStatus::Approved,
        )
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
