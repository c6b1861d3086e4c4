use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::entities::{cart, cart_item, product, product_size, size};

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Error, Debug)]
pub enum CartError {
    #[error("No product with {0} id is on sale")]
    ProductUnavailable(i32),
    #[error("Size does not belong to this product")]
    SizeMismatch,
    #[error("No cart item with {0} id was found")]
    ItemNotFound(i32),
    #[error("A cart line holds at most {} items, {requested} requested", MAX_LINE_QUANTITY)]
    QuantityLimit { requested: i32 },
    #[error(transparent)]
    Db(#[from] DbErr),
}

pub async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
) -> Result<Option<cart::Model>, DbErr> {
    cart::Entity::find()
        .filter(cart::Column::SessionKey.eq(session_key))
        .one(conn)
        .await
}

pub async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
) -> Result<cart::Model, DbErr> {
    if let Some(cart) = find_cart(conn, session_key).await? {
        return Ok(cart);
    }

    let now = Utc::now();
    cart::ActiveModel {
        session_key: Set(session_key.to_owned()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
}

pub async fn touch_cart<C: ConnectionTrait>(conn: &C, cart: cart::Model) -> Result<(), DbErr> {
    let mut active: cart::ActiveModel = cart.into();
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map(|_| ())
}

/// Adds a line or merges the quantity into the existing line for the same size.
/// Stock is not checked here; checkout does that.
pub async fn add_item<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    product_id: i32,
    product_size_id: i32,
    quantity: i32,
) -> Result<cart_item::Model, CartError> {
    let product = product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .filter(|product| product.is_active)
        .ok_or(CartError::ProductUnavailable(product_id))?;

    product_size::Entity::find_by_id(product_size_id)
        .filter(product_size::Column::ProductId.eq(product.id))
        .one(conn)
        .await?
        .ok_or(CartError::SizeMismatch)?;

    let cart = get_or_create_cart(conn, session_key).await?;
    let existing = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .filter(cart_item::Column::ProductSizeId.eq(product_size_id))
        .one(conn)
        .await?;

    let item = match existing {
        Some(item) => {
            let merged = item.quantity.saturating_add(quantity);
            if merged > MAX_LINE_QUANTITY {
                return Err(CartError::QuantityLimit { requested: merged });
            }
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(merged);
            item.update(conn).await?
        }
        None => {
            cart_item::ActiveModel {
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                product_size_id: Set(product_size_id),
                quantity: Set(quantity),
                added_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(conn)
            .await?
        }
    };
    debug!(cart_id = cart.id, item_id = item.id, quantity = item.quantity, "Cart line saved");
    touch_cart(conn, cart).await?;
    Ok(item)
}

async fn owned_item<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    item_id: i32,
) -> Result<(cart::Model, cart_item::Model), CartError> {
    let cart = find_cart(conn, session_key)
        .await?
        .ok_or(CartError::ItemNotFound(item_id))?;
    let item = cart_item::Entity::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(conn)
        .await?
        .ok_or(CartError::ItemNotFound(item_id))?;
    Ok((cart, item))
}

/// Sets a line's quantity. Zero removes the line and returns `None`.
pub async fn set_quantity<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    item_id: i32,
    quantity: i32,
) -> Result<Option<cart_item::Model>, CartError> {
    let (cart, item) = owned_item(conn, session_key, item_id).await?;
    let updated = if quantity == 0 {
        cart_item::Entity::delete_by_id(item.id).exec(conn).await?;
        None
    } else {
        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        Some(item.update(conn).await?)
    };
    touch_cart(conn, cart).await?;
    Ok(updated)
}

pub async fn remove_item<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    item_id: i32,
) -> Result<(), CartError> {
    let (cart, item) = owned_item(conn, session_key, item_id).await?;
    cart_item::Entity::delete_by_id(item.id).exec(conn).await?;
    touch_cart(conn, cart).await?;
    Ok(())
}

/// Empties the session's cart. Returns how many lines were dropped.
pub async fn clear_cart<C: ConnectionTrait>(conn: &C, session_key: &str) -> Result<u64, CartError> {
    let Some(cart) = find_cart(conn, session_key).await? else {
        return Ok(0);
    };
    let removed = cart_item::Entity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(conn)
        .await?
        .rows_affected;
    touch_cart(conn, cart).await?;
    Ok(removed)
}

/// A cart item joined with the rows checkout and the cart view need.
#[derive(Clone, Debug)]
pub struct CartLine {
    pub item: cart_item::Model,
    pub product: product::Model,
    pub product_size: product_size::Model,
    pub size_name: String,
}

impl CartLine {
    pub fn total_price_cents(&self) -> i64 {
        self.product.price_cents * i64::from(self.item.quantity)
    }
}

/// Loads every line of a cart, oldest first, with three batched lookups.
pub async fn load_lines<C: ConnectionTrait>(conn: &C, cart_id: i32) -> Result<Vec<CartLine>, DbErr> {
    let items = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::AddedAt)
        .order_by_asc(cart_item::Column::Id)
        .all(conn)
        .await?;
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
    let size_row_ids: Vec<i32> = items.iter().map(|item| item.product_size_id).collect();

    let products: HashMap<i32, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let size_rows: HashMap<i32, (product_size::Model, Option<size::Model>)> =
        product_size::Entity::find()
            .filter(product_size::Column::Id.is_in(size_row_ids))
            .find_also_related(size::Entity)
            .all(conn)
            .await?
            .into_iter()
            .map(|(row, size)| (row.id, (row, size)))
            .collect();

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = products.get(&item.product_id).cloned();
        let size_row = size_rows.get(&item.product_size_id).cloned();
        // Foreign keys cascade, so both rows exist while the item does.
        if let (Some(product), Some((product_size, size))) = (product, size_row) {
            lines.push(CartLine {
                size_name: size.map(|size| size.name).unwrap_or_default(),
                item,
                product,
                product_size,
            });
        }
    }
    Ok(lines)
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: i32,
    pub product_id: i32,
    pub product_slug: String,
    pub product_name: String,
    pub product_size_id: i32,
    pub size_name: String,
    pub quantity: i32,
    pub in_stock: i32,
    pub price_cents: i64,
    pub total_price_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total_items: i32,
    pub total_price_cents: i64,
}

impl CartView {
    pub fn empty() -> CartView {
        CartView::new(&[])
    }

    pub fn new(lines: &[CartLine]) -> CartView {
        let items: Vec<CartLineView> = lines
            .iter()
            .map(|line| CartLineView {
                id: line.item.id,
                product_id: line.product.id,
                product_slug: line.product.slug.clone(),
                product_name: line.product.name.clone(),
                product_size_id: line.product_size.id,
                size_name: line.size_name.clone(),
                quantity: line.item.quantity,
                in_stock: line.product_size.stock,
                price_cents: line.product.price_cents,
                total_price_cents: line.total_price_cents(),
            })
            .collect();

        CartView {
            total_items: items.iter().map(|item| item.quantity).sum(),
            total_price_cents: items.iter().map(|item| item.total_price_cents).sum(),
            items,
        }
    }
}
