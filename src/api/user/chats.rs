use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::ajax;
use crate::entities::user;
use crate::middleware::{htmx::HxRequest, logging::ApiError};
use crate::services::chat::{list_chats, open_chat, send_message, start_chat, unread_count};

pub fn chats_router() -> Router {
    Router::new()
        .route("/chats", get(get_chats))
        .route("/chats/unread-count", get(get_unread_count))
        .route("/chats/start/:slug", post(post_start_chat))
        .route("/chats/:id", get(get_chat))
        .route("/chats/:id/send", post(post_message))
        .route("/chats/:id/messages", get(poll_messages))
}

async fn get_chats(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(list_chats(&*db, user.id).await?))
}

async fn get_unread_count(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let count = unread_count(&*db, user.id).await?;
    Ok(Json(json!({ "unread_count": count })))
}

async fn post_start_chat(
    Path(slug): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let (chat, created) = start_chat(&*db, user.id, &slug).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "chat": chat, "created": created }))))
}

async fn get_chat(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(open_chat(&*db, user.id, id).await?))
}

/// Same as opening the chat; the front end polls this to refresh the thread.
async fn poll_messages(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = open_chat(&*db, user.id, id).await?;
    Ok(Json(json!({ "messages": thread.messages })))
}

async fn post_message(
    hx: HxRequest,
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<user::Model>,
    Json(payload): Json<SendMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let sent = match send_message(&txn, user.id, id, &payload.text).await {
        Ok(sent) => {
            txn.commit().await?;
            sent
        }
        Err(err) => {
            let _ = txn.rollback().await;
            return Err(err.into());
        }
    };

    Ok(hx.trigger(
        "message-sent",
        (
            StatusCode::CREATED,
            ajax(true, "Message sent", json!({ "sent": sent })),
        ),
    ))
}

#[derive(Debug, Deserialize)]
struct SendMessage {
    text: String,
}
