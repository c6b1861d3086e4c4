use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_id";

/// Anonymous visitor identity. Carts hang off this key.
#[derive(Clone, Debug)]
pub struct Session {
    pub key: String,
}

pub async fn session_middleware(jar: CookieJar, mut req: Request, next: Next) -> Response {
    let existing = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| Uuid::parse_str(value).is_ok());

    let (key, fresh) = match existing {
        Some(key) => (key, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    req.extensions_mut().insert(Session { key: key.clone() });
    let response = next.run(req).await;

    if !fresh {
        return response;
    }

    debug!(session = %key, "Issued new session");
    let cookie = Cookie::build((SESSION_COOKIE, key))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), response).into_response()
}
