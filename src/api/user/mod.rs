pub mod chats;
pub mod listing;
pub mod orders;
pub mod profile;
pub mod wishlist;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::middleware::auth::{auth_middleware, Access, AuthState};
use chats::chats_router;
use listing::listing_router;
use orders::orders_router;
use profile::profile_router;
use wishlist::wishlist_router;

pub fn user_api_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .merge(profile_router())
        .merge(orders_router())
        .merge(listing_router())
        .merge(wishlist_router())
        .merge(chats_router())
        .layer(from_fn_with_state(
            AuthState {
                db,
                config,
                access: Access::Authenticated,
            },
            auth_middleware,
        ))
}
