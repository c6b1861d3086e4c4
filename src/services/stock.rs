use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use tracing::info;

use crate::entities::{product, product_size};

/// Rewrites `total_stock` from the per-size rows and takes the listing off sale once nothing
/// is left. Never re-activates a listing.
pub async fn recompute_total_stock<C>(conn: &C, product: product::Model) -> Result<product::Model, DbErr>
where
    C: ConnectionTrait,
{
    let total: i64 = product_size::Entity::find()
        .filter(product_size::Column::ProductId.eq(product.id))
        .all(conn)
        .await?
        .iter()
        .map(|size| i64::from(size.stock))
        .sum();
    let total = i32::try_from(total).map_err(|_| {
        DbErr::Custom(format!("Total stock of product {} overflows", product.id))
    })?;

    let deactivate = total == 0 && product.is_active;
    if total == product.total_stock && !deactivate {
        return Ok(product);
    }

    let name = product.name.clone();
    let mut active: product::ActiveModel = product.into();
    active.total_stock = Set(total);
    if deactivate {
        active.is_active = Set(false);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(conn).await?;

    if deactivate {
        info!(product = %name, "Product is out of stock and was deactivated");
    }
    Ok(updated)
}
