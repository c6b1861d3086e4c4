use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::ValidationErrors;

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();
    match response.extensions().get::<ApiError>() {
        Some(err) if status.is_server_error() => error!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            error = %err,
            "Failed to process request"
        ),
        Some(err) => warn!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            error = %err,
            "Rejected request"
        ),
        None => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
    }

    response
}

/// Every failure a handler can surface. The error travels in the response extensions so the
/// logging middleware can record what the client only sees as a short message.
#[derive(Clone, Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    DbError(String),
    #[error("Failed to validate: {0}")]
    ValidationFail(ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),
    #[error("Checkout failed: {0}")]
    CheckoutFailed(String),
    #[error("Failed to hash password {0}")]
    PasswordHashFailed(String),
    #[error("Failed to generate token: {0}")]
    TokenGenerationFailed(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ValidationFail(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::InsufficientStock(_) => StatusCode::CONFLICT,
            ApiError::DbError(_)
            | ApiError::CheckoutFailed(_)
            | ApiError::PasswordHashFailed(_)
            | ApiError::TokenGenerationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client is told. Internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::ValidationFail(_) => "Please correct the errors in the form.".to_string(),
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InsufficientStock(msg) => msg.clone(),
            ApiError::Unauthorized(_) => "Unauthorized".to_string(),
            ApiError::Forbidden(_) => "You do not have permission to do this".to_string(),
            ApiError::CheckoutFailed(_) => {
                "Failed to place the order. Please try again.".to_string()
            }
            ApiError::DbError(_)
            | ApiError::PasswordHashFailed(_)
            | ApiError::TokenGenerationFailed(_) => "Internal server error".to_string(),
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        ApiError::DbError(err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::ValidationFail(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::ValidationFail(fields) => json!({
                "error": self.public_message(),
                "fields": fields,
            }),
            _ => json!({ "error": self.public_message() }),
        };

        to_response((self.status(), Json(body)), Some(self))
    }
}

pub fn to_response<T: IntoResponse>(
    response: T,             // The response that we are sending + StatusCode
    ext: Option<ApiError>,   // What the logging middleware should report
) -> Response {
    let mut response = response.into_response();

    if let Some(err) = ext {
        response.extensions_mut().insert(err);
    }

    response
}
