use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::entities::{order, product, user};
use crate::middleware::logging::ApiError;

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

const RECENT_ORDERS: u64 = 3;

pub fn profile_router() -> Router {
    Router::new().route("/profile", get(get_profile).patch(patch_profile))
}

async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let recent_orders = order::Entity::find()
        .filter(order::Column::UserId.eq(user.id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .limit(RECENT_ORDERS)
        .all(&*db)
        .await?;

    let total_listings = product::Entity::find()
        .filter(product::Column::OwnerId.eq(user.id))
        .count(&*db)
        .await?;
    let active_listings = product::Entity::find()
        .filter(product::Column::OwnerId.eq(user.id))
        .filter(product::Column::IsActive.eq(true))
        .count(&*db)
        .await?;

    Ok(Json(json!({
        "user": user,
        "recent_orders": recent_orders,
        "listings": {
            "total": total_listings,
            "active": active_listings,
        },
    })))
}

async fn patch_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
    Json(mut payload): Json<PatchProfile>,
) -> Result<impl IntoResponse, ApiError> {
    payload.sanitize();
    payload.validate()?;
    let user_id = user.id;
    let current_email = user.email.clone();
    let mut active: user::ActiveModel = user.clone().into();

    if let Some(email) = payload.email {
        if email != current_email {
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(&email))
                .filter(user::Column::Id.ne(user_id))
                .one(&*db)
                .await?
                .is_some();
            if taken {
                return Err(ApiError::Conflict(
                    "This email is already in use".to_string(),
                ));
            }
            active.email = Set(email);
        }
    }

    let fields = [
        (payload.first_name, &mut active.first_name),
        (payload.last_name, &mut active.last_name),
        (payload.phone, &mut active.phone),
        (payload.company, &mut active.company),
        (payload.address1, &mut active.address1),
        (payload.address2, &mut active.address2),
        (payload.city, &mut active.city),
        (payload.country, &mut active.country),
        (payload.province, &mut active.province),
        (payload.postal_code, &mut active.postal_code),
    ];
    for (value, column) in fields {
        if let Some(value) = value {
            *column = Set(value);
        }
    }

    if !active.is_changed() {
        return Ok(Json(user));
    }
    let updated = active.update(&*db).await?;
    info!(user_id, "Profile updated");
    Ok(Json(updated))
}

/// Drops anything that looks like markup and surrounding whitespace.
fn strip_tags(value: &str) -> String {
    TAGS.replace_all(value, "").trim().to_string()
}

impl PatchProfile {
    /// Runs before validation, so a value made only of markup counts as empty.
    fn sanitize(&mut self) {
        if let Some(email) = self.email.as_mut() {
            *email = email.trim().to_lowercase();
        }
        for value in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.phone,
            &mut self.company,
            &mut self.address1,
            &mut self.address2,
            &mut self.city,
            &mut self.country,
            &mut self.province,
            &mut self.postal_code,
        ]
        .into_iter()
        .flatten()
        {
            *value = strip_tags(value);
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct PatchProfile {
    #[validate(email)]
    email: Option<String>,
    #[validate(length(min = 1, max = 50))]
    first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    last_name: Option<String>,
    #[validate(length(max = 30))]
    phone: Option<String>,
    #[validate(length(max = 100))]
    company: Option<String>,
    #[validate(length(max = 200))]
    address1: Option<String>,
    #[validate(length(max = 200))]
    address2: Option<String>,
    #[validate(length(max = 100))]
    city: Option<String>,
    #[validate(length(max = 100))]
    country: Option<String>,
    #[validate(length(max = 100))]
    province: Option<String>,
    #[validate(length(max = 20))]
    postal_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_removed() {
        assert_eq!(strip_tags("<b>Kate</b>"), "Kate");
        assert_eq!(strip_tags(" <script>alert(1)</script>Main st "), "alert(1)Main st");
    }

    #[test]
    fn plain_text_is_kept() {
        assert_eq!(strip_tags("Flat 4, 2nd floor"), "Flat 4, 2nd floor");
    }

    #[test]
    fn markup_only_name_is_rejected() {
        let mut payload: PatchProfile = serde_json::from_value(serde_json::json!({
            "first_name": "<b></b>",
            "email": "  Kate@Campus.Local ",
        }))
        .unwrap();
        payload.sanitize();
        assert_eq!(payload.email.as_deref(), Some("kate@campus.local"));
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("first_name"));
    }
}
