use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    category,
    product::{self, ProductCondition},
    product_moderation::{self, ModerationStatus},
    product_size, size,
};

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("No category with {0} id was found")]
    UnknownCategory(i32),
    #[error("Size '{0}' is listed more than once")]
    DuplicateSize(String),
    #[error("No listing with {0} id was found")]
    NotFound(i32),
    #[error("Total stock of a listing cannot exceed {}", i32::MAX)]
    StockOverflow,
    #[error("Only approved listings with stock can be activated")]
    NotPublishable,
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewListing {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub category_id: i32,
    #[validate(length(min = 1, max = 100))]
    pub color: String,
    #[serde(default)]
    pub description: String,
    pub condition: Option<ProductCondition>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub material: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub brand: String,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[serde(default)]
    #[validate(nested)]
    pub sizes: Vec<SizeStock>,
    /// Stock of the implicit "One Size" entry when `sizes` is empty.
    #[serde(default)]
    #[validate(range(min = 0, max = 100_000))]
    pub stock: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SizeStock {
    #[validate(length(min = 1, max = 20))]
    pub size: String,
    #[validate(range(min = 0, max = 100_000))]
    pub stock: i32,
}

impl NewListing {
    /// Trims free-text fields so validation sees what will be stored.
    pub fn normalize(&mut self) {
        for value in [
            &mut self.name,
            &mut self.color,
            &mut self.description,
            &mut self.material,
            &mut self.brand,
        ] {
            *value = value.trim().to_string();
        }
        for entry in &mut self.sizes {
            entry.size = entry.size.trim().to_string();
        }
    }
}

fn total_stock(sizes: &[(String, i32)]) -> Result<i32, ListingError> {
    sizes
        .iter()
        .try_fold(0i32, |total, (_, stock)| total.checked_add(*stock))
        .ok_or(ListingError::StockOverflow)
}

/// ASCII, lowercase, `-` separated. Characters outside `[a-z0-9]` are dropped.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

async fn unique_slug<C: ConnectionTrait>(conn: &C, name: &str) -> Result<String, DbErr> {
    let mut base = slugify(name);
    if base.is_empty() {
        base = format!("product-{}", &Uuid::new_v4().simple().to_string()[..8]);
    }

    let mut slug = base.clone();
    let mut counter = 1;
    while product::Entity::find()
        .filter(product::Column::Slug.eq(&slug))
        .one(conn)
        .await?
        .is_some()
    {
        slug = format!("{base}-{counter}");
        counter += 1;
    }
    Ok(slug)
}

async fn size_by_name<C: ConnectionTrait>(conn: &C, name: &str) -> Result<size::Model, DbErr> {
    if let Some(existing) = size::Entity::find()
        .filter(size::Column::Name.eq(name))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    size::ActiveModel {
        name: Set(name.to_owned()),
        ..Default::default()
    }
    .insert(conn)
    .await
}

/// Creates the product, its per-size stock rows and a pending moderation record.
/// The listing stays hidden until a moderator approves it.
pub async fn create_listing<C: ConnectionTrait>(
    conn: &C,
    owner_id: i32,
    listing: NewListing,
) -> Result<product::Model, ListingError> {
    if category::Entity::find_by_id(listing.category_id)
        .one(conn)
        .await?
        .is_none()
    {
        return Err(ListingError::UnknownCategory(listing.category_id));
    }

    let sizes: Vec<(String, i32)> = if listing.sizes.is_empty() {
        vec![(size::ONE_SIZE.to_string(), listing.stock)]
    } else {
        let mut seen = HashSet::new();
        let mut sizes = Vec::with_capacity(listing.sizes.len());
        for entry in listing.sizes {
            let name = entry.size.trim().to_string();
            if !seen.insert(name.to_lowercase()) {
                return Err(ListingError::DuplicateSize(name));
            }
            sizes.push((name, entry.stock));
        }
        sizes
    };
    let total_stock = total_stock(&sizes)?;

    let now = Utc::now();
    let product = product::ActiveModel {
        owner_id: Set(Some(owner_id)),
        slug: Set(unique_slug(conn, &listing.name).await?),
        name: Set(listing.name),
        category_id: Set(listing.category_id),
        color: Set(listing.color),
        description: Set(listing.description),
        condition: Set(listing.condition),
        material: Set(listing.material),
        brand: Set(listing.brand),
        price_cents: Set(listing.price_cents),
        total_stock: Set(total_stock),
        is_active: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    for (name, stock) in sizes {
        let size = size_by_name(conn, &name).await?;
        product_size::ActiveModel {
            product_id: Set(product.id),
            size_id: Set(size.id),
            stock: Set(stock),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }

    product_moderation::ActiveModel {
        product_id: Set(product.id),
        status: Set(ModerationStatus::Pending),
        moderator_id: Set(None),
        created_at: Set(now),
        moderated_at: Set(None),
        rejection_reason: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    info!(product_id = product.id, slug = %product.slug, owner_id, "Listing created, awaiting moderation");
    Ok(product)
}

/// Flips `is_active` on an owner's listing. Switching on requires an approved listing with
/// stock left.
pub async fn toggle_listing<C: ConnectionTrait>(
    conn: &C,
    owner_id: i32,
    product_id: i32,
) -> Result<product::Model, ListingError> {
    let product = product::Entity::find_by_id(product_id)
        .filter(product::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await?
        .ok_or(ListingError::NotFound(product_id))?;

    let activate = !product.is_active;
    if activate {
        let approved = product_moderation::Entity::find()
            .filter(product_moderation::Column::ProductId.eq(product.id))
            .one(conn)
            .await?
            .is_some_and(|moderation| moderation.status == ModerationStatus::Approved);
        if !approved || product.total_stock == 0 {
            return Err(ListingError::NotPublishable);
        }
    }

    let mut active: product::ActiveModel = product.into();
    active.is_active = Set(activate);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_from_plain_name() {
        assert_eq!(slugify("Vintage Denim Jacket"), "vintage-denim-jacket");
    }

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(slugify("  Nike -- Air Max 90!! "), "nike-air-max-90");
    }

    #[test]
    fn slug_drops_non_ascii() {
        assert_eq!(slugify("Куртка"), "");
        assert_eq!(slugify("Куртка XL"), "xl");
    }

    fn listing_with(sizes: Vec<SizeStock>) -> NewListing {
        NewListing {
            name: "Hoodie".to_string(),
            category_id: 1,
            color: "black".to_string(),
            description: String::new(),
            condition: None,
            material: String::new(),
            brand: String::new(),
            price_cents: 1500,
            sizes,
            stock: 0,
        }
    }

    #[test]
    fn nested_size_validation() {
        let listing = listing_with(vec![SizeStock {
            size: "M".to_string(),
            stock: -1,
        }]);
        assert!(listing.validate().is_err());
    }

    #[test]
    fn blank_size_fails_after_normalize() {
        let mut listing = listing_with(vec![SizeStock {
            size: "   ".to_string(),
            stock: 1,
        }]);
        listing.name = "  Hoodie  ".to_string();
        listing.normalize();
        assert_eq!(listing.name, "Hoodie");
        let errors = listing.validate().unwrap_err();
        assert!(errors.errors().contains_key("sizes"));
    }

    #[test]
    fn stock_is_capped_per_size() {
        let listing = listing_with(vec![
            SizeStock {
                size: "M".to_string(),
                stock: i32::MAX,
            },
            SizeStock {
                size: "L".to_string(),
                stock: 1,
            },
        ]);
        assert!(listing.validate().is_err());
    }

    #[test]
    fn total_stock_overflow_is_an_error() {
        let sizes = vec![("M".to_string(), i32::MAX), ("L".to_string(), 1)];
        assert!(matches!(total_stock(&sizes), Err(ListingError::StockOverflow)));

        let sizes = vec![("M".to_string(), 2), ("L".to_string(), 3)];
        assert_eq!(total_stock(&sizes).unwrap(), 5);
    }
}
