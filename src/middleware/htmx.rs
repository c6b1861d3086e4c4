use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderValue},
    response::{IntoResponse, Response},
};
use std::convert::Infallible;

/// Whether the request came from an in-page HTMX swap.
#[derive(Clone, Copy, Debug, Default)]
pub struct HxRequest(pub bool);

#[async_trait]
impl<S> FromRequestParts<S> for HxRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let flagged = parts
            .headers
            .get("HX-Request")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        Ok(HxRequest(flagged))
    }
}

impl HxRequest {
    /// Tags the response with the client-side event HTMX should fire after the swap.
    pub fn trigger<T: IntoResponse>(self, event: &'static str, response: T) -> Response {
        let mut response = response.into_response();
        if self.0 {
            response
                .headers_mut()
                .insert("HX-Trigger", HeaderValue::from_static(event));
        }
        response
    }
}
