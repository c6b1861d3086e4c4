pub mod auth;
pub mod cart;
pub mod catalog;

use axum::Router;

use auth::auth_router;
use cart::cart_router;
use catalog::catalog_router;

/// Routes open to anonymous visitors. The cart only needs the session cookie.
pub fn public_api_router() -> Router {
    Router::new()
        .merge(auth_router())
        .nest("/api", catalog_router().merge(cart_router()))
}
