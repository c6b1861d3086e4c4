pub mod listings;
pub mod orders;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::middleware::auth::{auth_middleware, Access, AuthState};
use listings::listings_router;
use orders::orders_router;

/// Staff-only routes: the moderation queue and order status changes.
pub fn moderator_api_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .merge(listings_router())
        .merge(orders_router())
        .layer(from_fn_with_state(
            AuthState {
                db,
                config,
                access: Access::Staff,
            },
            auth_middleware,
        ))
}
