use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::user::{self, Entity as UserEntity, Role};
use crate::middleware::{auth::generate_token, logging::ApiError};

pub fn auth_router() -> Router {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login))
}

async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateUser>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let taken = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&*db)
        .await?
        .is_some();
    if taken {
        return Err(ApiError::Conflict(
            "A user with this email already exists".to_string(),
        ));
    }

    let new_user = user::ActiveModel {
        email: Set(email),
        password: Set(hash_password(&payload.password)?),
        first_name: Set(payload.first_name.trim().to_owned()),
        last_name: Set(payload.last_name.trim().to_owned()),
        phone: Set(String::new()),
        company: Set(String::new()),
        address1: Set(String::new()),
        address2: Set(String::new()),
        city: Set(String::new()),
        country: Set(String::new()),
        province: Set(String::new()),
        postal_code: Set(String::new()),
        role: Set(Role::User),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&*db)
    .await?;

    info!(user_id = new_user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "id": new_user.id,
        })),
    ))
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    Json(payload): Json<UserLogin>,
) -> Result<impl IntoResponse, ApiError> {
    let model = UserEntity::find()
        .filter(user::Column::Email.eq(payload.email.trim().to_lowercase()))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown email".to_string()))?;

    model
        .check_hash(&payload.password)
        .map_err(ApiError::Unauthorized)?;

    let token = generate_token(model.id, model.role, &config)
        .map_err(|err| ApiError::TokenGenerationFailed(err.to_string()))?;

    Ok(Json(json!({
        "token": token,
        "role": model.role,
    })))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::PasswordHashFailed(err.to_string()))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateUser {
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    #[validate(length(min = 1, max = 50))]
    first_name: String,
    #[validate(length(min = 1, max = 50))]
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct UserLogin {
    email: String,
    password: String,
}
