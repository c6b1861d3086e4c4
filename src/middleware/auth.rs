use crate::config::AppConfig;
use crate::entities::user::{self, Entity as UserEntity};
use crate::middleware::logging::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return Err(ApiError::Unauthorized("Missing bearer token".to_string())),
    };

    let (claims, user) = validate_token(&state, token).await.map_err(|err| match err {
        AuthMiddlewareError::InsufficientRole => ApiError::Forbidden(err.to_string()),
        AuthMiddlewareError::Db(db_err) => ApiError::DbError(db_err),
        _ => ApiError::Unauthorized(err.to_string()),
    })?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

/// Who may pass a given router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    Staff,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub access: Access,
}

pub fn generate_token(
    user_id: i32,
    role: user::Role,
    config: &AppConfig,
) -> Result<String, AuthMiddlewareError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(config.token_ttl_hours))
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims {
        user_id,
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

/// Decodes the token and re-reads the user, so a demoted moderator loses access at once.
pub async fn validate_token(
    state: &AuthState,
    token: &str,
) -> Result<(Claims, user::Model), AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthMiddlewareError::TokenExpired)?
    .claims;

    let user = UserEntity::find_by_id(claims.user_id)
        .one(&*state.db)
        .await
        .map_err(|err: DbErr| AuthMiddlewareError::Db(err.to_string()))?
        .ok_or(AuthMiddlewareError::InvalidUserOrRole)?;

    match state.access {
        Access::Staff if !user.is_staff() => Err(AuthMiddlewareError::InsufficientRole),
        _ => Ok((claims, user)),
    }
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Invalid user id or role")]
    InvalidUserOrRole,
    #[error("Staff role required")]
    InsufficientRole,
    #[error("Token expired or malformed")]
    TokenExpired,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Database error: {0}")]
    Db(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            secret: "a-test-secret-that-is-long-enough".to_string(),
            token_ttl_hours: 1,
            max_connections: 1,
            seed_database: false,
            seed_password: "Secret15".to_string(),
        }
    }

    #[test]
    fn generated_token_decodes_with_same_secret() {
        let config = config();
        let token = generate_token(42, user::Role::Moderator, &config).unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(config.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(decoded.claims.user_id, 42);
        assert_eq!(decoded.claims.role, "moderator");
    }

    #[test]
    fn token_is_rejected_with_other_secret() {
        let token = generate_token(1, user::Role::User, &config()).unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"some-other-secret-value"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }
}
