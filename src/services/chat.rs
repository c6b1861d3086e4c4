//! Buyer-seller threads. A chat belongs to exactly two users; everyone else gets "not found".

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::entities::{
    chat::{self, participant_pair},
    message, product, user,
};

/// How many messages an opened thread shows.
pub const THREAD_WINDOW: u64 = 50;
pub const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No chat with {0} id was found")]
    NotFound(i32),
    #[error("No product '{0}' was found")]
    ProductNotFound(String),
    #[error("This listing has no seller to message")]
    NoSeller,
    #[error("You cannot start a chat about your own listing")]
    OwnListing,
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Message is longer than {MAX_MESSAGE_LEN} characters")]
    MessageTooLong,
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// The part of a user the other side of a chat gets to see.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
}

impl From<user::Model> for Participant {
    fn from(user: user::Model) -> Self {
        Participant {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub chat: chat::Model,
    pub other_user: Option<Participant>,
    pub last_message: Option<message::Model>,
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
pub struct ChatThread {
    pub chat: chat::Model,
    pub other_user: Option<Participant>,
    pub messages: Vec<message::Model>,
}

fn involving(user_id: i32) -> Condition {
    Condition::any()
        .add(chat::Column::FirstUserId.eq(user_id))
        .add(chat::Column::SecondUserId.eq(user_id))
}

async fn participant_chat<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    chat_id: i32,
) -> Result<chat::Model, ChatError> {
    chat::Entity::find_by_id(chat_id)
        .filter(involving(user_id))
        .one(conn)
        .await?
        .ok_or(ChatError::NotFound(chat_id))
}

/// Every chat of the user, most recently active first.
pub async fn list_chats<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<Vec<ChatSummary>, ChatError> {
    let chats = chat::Entity::find()
        .filter(involving(user_id))
        .order_by_desc(chat::Column::UpdatedAt)
        .order_by_desc(chat::Column::Id)
        .all(conn)
        .await?;

    let peer_ids: Vec<i32> = chats
        .iter()
        .map(|chat| chat.other_participant(user_id))
        .collect();
    let mut peers: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(peer_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let mut summaries = Vec::with_capacity(chats.len());
    for chat in chats {
        let last_message = message::Entity::find()
            .filter(message::Column::ChatId.eq(chat.id))
            .order_by_desc(message::Column::CreatedAt)
            .order_by_desc(message::Column::Id)
            .one(conn)
            .await?;
        let unread_count = message::Entity::find()
            .filter(message::Column::ChatId.eq(chat.id))
            .filter(message::Column::SenderId.ne(user_id))
            .filter(message::Column::IsRead.eq(false))
            .count(conn)
            .await?;

        // A user can only be a peer in one chat, so removing is fine.
        let other_user = peers.remove(&chat.other_participant(user_id)).map(Participant::from);
        summaries.push(ChatSummary {
            chat,
            other_user,
            last_message,
            unread_count,
        });
    }
    Ok(summaries)
}

/// Unread messages across all of the user's chats.
pub async fn unread_count<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<u64, ChatError> {
    Ok(message::Entity::find()
        .inner_join(chat::Entity)
        .filter(involving(user_id))
        .filter(message::Column::SenderId.ne(user_id))
        .filter(message::Column::IsRead.eq(false))
        .count(conn)
        .await?)
}

/// Finds or creates the chat between the user and the seller of a product.
/// Returns the chat and whether it was created.
pub async fn start_chat<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    product_slug: &str,
) -> Result<(chat::Model, bool), ChatError> {
    let product = product::Entity::find()
        .filter(product::Column::Slug.eq(product_slug))
        .one(conn)
        .await?
        .ok_or_else(|| ChatError::ProductNotFound(product_slug.to_owned()))?;

    let seller_id = product.owner_id.ok_or(ChatError::NoSeller)?;
    if seller_id == user_id {
        return Err(ChatError::OwnListing);
    }

    let (first, second) = participant_pair(user_id, seller_id);
    if let Some(existing) = chat::Entity::find()
        .filter(chat::Column::FirstUserId.eq(first))
        .filter(chat::Column::SecondUserId.eq(second))
        .one(conn)
        .await?
    {
        return Ok((existing, false));
    }

    let now = Utc::now();
    let chat = chat::ActiveModel {
        first_user_id: Set(first),
        second_user_id: Set(second),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    debug!(chat_id = chat.id, product = %product.slug, "Chat started");
    Ok((chat, true))
}

/// Marks the other side's messages read and returns the latest window in chronological order.
pub async fn open_chat<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    chat_id: i32,
) -> Result<ChatThread, ChatError> {
    let chat = participant_chat(conn, user_id, chat_id).await?;

    let marked = message::Entity::update_many()
        .col_expr(message::Column::IsRead, Expr::value(true))
        .filter(message::Column::ChatId.eq(chat.id))
        .filter(message::Column::SenderId.ne(user_id))
        .filter(message::Column::IsRead.eq(false))
        .exec(conn)
        .await?
        .rows_affected;
    if marked > 0 {
        debug!(chat_id = chat.id, marked, "Messages marked read");
    }

    let mut messages = message::Entity::find()
        .filter(message::Column::ChatId.eq(chat.id))
        .order_by_desc(message::Column::CreatedAt)
        .order_by_desc(message::Column::Id)
        .limit(THREAD_WINDOW)
        .all(conn)
        .await?;
    messages.reverse();

    let other_user = user::Entity::find_by_id(chat.other_participant(user_id))
        .one(conn)
        .await?
        .map(Participant::from);

    Ok(ChatThread {
        chat,
        other_user,
        messages,
    })
}

pub async fn send_message<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    chat_id: i32,
    text: &str,
) -> Result<message::Model, ChatError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ChatError::MessageTooLong);
    }

    let chat = participant_chat(conn, user_id, chat_id).await?;
    let now = Utc::now();
    let message = message::ActiveModel {
        chat_id: Set(chat.id),
        sender_id: Set(user_id),
        text: Set(text.to_owned()),
        is_read: Set(false),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let mut chat: chat::ActiveModel = chat.into();
    chat.updated_at = Set(now);
    chat.update(conn).await?;

    Ok(message)
}
