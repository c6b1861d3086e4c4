use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use thiserror::Error;
use tracing::info;

use crate::entities::{
    product,
    product_moderation::{self, ModerationStatus},
};

#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("No listing with {0} id awaits moderation")]
    NotFound(i32),
    #[error("Listing was already {0:?}")]
    AlreadyModerated(ModerationStatus),
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Debug)]
pub struct ModerationOutcome {
    pub product: product::Model,
    pub moderation: product_moderation::Model,
    /// Approved listings without stock stay unpublished.
    pub published: bool,
}

pub async fn approve_listing(
    db: &DatabaseConnection,
    moderator_id: i32,
    product_id: i32,
) -> Result<ModerationOutcome, ModerationError> {
    transition(db, moderator_id, product_id, ModerationStatus::Approved, None).await
}

pub async fn reject_listing(
    db: &DatabaseConnection,
    moderator_id: i32,
    product_id: i32,
    reason: String,
) -> Result<ModerationOutcome, ModerationError> {
    transition(db, moderator_id, product_id, ModerationStatus::Rejected, Some(reason)).await
}

async fn transition(
    db: &DatabaseConnection,
    moderator_id: i32,
    product_id: i32,
    next: ModerationStatus,
    reason: Option<String>,
) -> Result<ModerationOutcome, ModerationError> {
    let txn = db.begin().await?;
    match apply(&txn, moderator_id, product_id, next, reason).await {
        Ok(outcome) => {
            txn.commit().await?;
            info!(
                product_id,
                moderator_id,
                status = ?outcome.moderation.status,
                published = outcome.published,
                "Listing moderated"
            );
            Ok(outcome)
        }
        Err(err) => {
            let _ = txn.rollback().await;
            Err(err)
        }
    }
}

async fn apply(
    txn: &DatabaseTransaction,
    moderator_id: i32,
    product_id: i32,
    next: ModerationStatus,
    reason: Option<String>,
) -> Result<ModerationOutcome, ModerationError> {
    let (moderation, product) = product_moderation::Entity::find()
        .filter(product_moderation::Column::ProductId.eq(product_id))
        .find_also_related(product::Entity)
        .one(txn)
        .await?
        .and_then(|(moderation, product)| product.map(|product| (moderation, product)))
        .ok_or(ModerationError::NotFound(product_id))?;

    if !moderation.status.can_transition_to(next) {
        return Err(ModerationError::AlreadyModerated(moderation.status));
    }

    let now = Utc::now();
    let mut moderation: product_moderation::ActiveModel = moderation.into();
    moderation.status = Set(next);
    moderation.moderator_id = Set(Some(moderator_id));
    moderation.moderated_at = Set(Some(now));
    if next == ModerationStatus::Rejected {
        moderation.rejection_reason = Set(reason);
    }
    let moderation = moderation.update(txn).await?;

    let published = next == ModerationStatus::Approved && product.total_stock > 0;
    let mut product: product::ActiveModel = product.into();
    product.is_active = Set(published);
    product.updated_at = Set(now);
    let product = product.update(txn).await?;

    Ok(ModerationOutcome {
        product,
        moderation,
        published,
    })
}
