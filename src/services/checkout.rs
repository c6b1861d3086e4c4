//! Turns a session cart into an order.
//!
//! Everything happens in one transaction: lines are checked against current stock, the order
//! and its items are written, per-size stock is decremented, product totals are recomputed
//! and the cart is emptied. Any failure rolls all of it back.

use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::entities::{
    cart, cart_item,
    order::{self, DeliveryAddress, Status},
    order_item, product, product_size, user,
};
use crate::services::{
    cart::{find_cart, load_lines, touch_cart, CartLine},
    stock::recompute_total_stock,
};

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{4,18}$").unwrap());

const ORDER_CODE_LEN: usize = 12;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CheckoutForm {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub patronymic: String,
    #[validate(regex(path = *PHONE_REGEX))]
    pub phone: String,
    pub delivery_address: DeliveryAddress,
    #[validate(length(min = 1, max = 20))]
    pub group_number: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub special_instructions: String,
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Not enough stock for {product} (size {size}): requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        size: String,
        requested: i32,
        available: i32,
    },
    #[error("{product} is no longer available")]
    Unavailable { product: String },
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

pub async fn place_order(
    db: &DatabaseConnection,
    buyer: &user::Model,
    session_key: &str,
    form: CheckoutForm,
) -> Result<PlacedOrder, CheckoutError> {
    let txn = db.begin().await?;
    match place_order_in(&txn, buyer, session_key, form).await {
        Ok(placed) => {
            txn.commit().await?;
            info!(
                order_code = %placed.order.order_code,
                user_id = buyer.id,
                items = placed.items.len(),
                total_price_cents = placed.order.total_price_cents,
                "Order placed"
            );
            Ok(placed)
        }
        Err(err) => {
            let _ = txn.rollback().await;
            warn!(user_id = buyer.id, error = %err, "Checkout rolled back");
            Err(err)
        }
    }
}

async fn place_order_in(
    txn: &DatabaseTransaction,
    buyer: &user::Model,
    session_key: &str,
    form: CheckoutForm,
) -> Result<PlacedOrder, CheckoutError> {
    let cart = find_cart(txn, session_key).await?.ok_or(CheckoutError::EmptyCart)?;
    let lines = load_lines(txn, cart.id).await?;
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    for line in &lines {
        check_line(line)?;
    }

    write_order(txn, buyer, cart, &lines, form).await
}

/// Writes the order for lines that already passed `check_line`. Stock may have moved since,
/// so every decrement is still conditional.
async fn write_order(
    txn: &DatabaseTransaction,
    buyer: &user::Model,
    cart: cart::Model,
    lines: &[CartLine],
    form: CheckoutForm,
) -> Result<PlacedOrder, CheckoutError> {
    let total_price_cents: i64 = lines.iter().map(CartLine::total_price_cents).sum();
    let now = Utc::now();
    let order = order::ActiveModel {
        user_id: Set(buyer.id),
        order_code: Set(unused_order_code(txn).await?),
        first_name: Set(form.first_name),
        last_name: Set(form.last_name),
        patronymic: Set(form.patronymic),
        phone: Set(form.phone),
        delivery_address: Set(form.delivery_address),
        group_number: Set(form.group_number),
        email: Set(Some(buyer.email.clone())),
        special_instructions: Set(form.special_instructions),
        total_price_cents: Set(total_price_cents),
        status: Set(Status::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    let mut touched = BTreeSet::new();
    for line in lines {
        debug!(
            product = %line.product.name,
            size = %line.size_name,
            quantity = line.item.quantity,
            "Processing cart line"
        );

        let item = order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(Some(line.product.id)),
            product_size_id: Set(Some(line.product_size.id)),
            product_name: Set(line.product.name.clone()),
            size_name: Set(line.size_name.clone()),
            quantity: Set(line.item.quantity),
            price_cents: Set(line.product.price_cents),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        items.push(item);

        decrement_stock(txn, line).await?;
        touched.insert(line.product.id);
    }

    for product_id in touched {
        if let Some(product) = product::Entity::find_by_id(product_id).one(txn).await? {
            recompute_total_stock(txn, product).await?;
        }
    }

    cart_item::Entity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(txn)
        .await?;
    touch_cart(txn, cart).await?;

    Ok(PlacedOrder { order, items })
}

fn check_line(line: &CartLine) -> Result<(), CheckoutError> {
    if !line.product.is_active {
        return Err(CheckoutError::Unavailable {
            product: line.product.name.clone(),
        });
    }
    if line.item.quantity > line.product_size.stock {
        return Err(CheckoutError::InsufficientStock {
            product: line.product.name.clone(),
            size: line.size_name.clone(),
            requested: line.item.quantity,
            available: line.product_size.stock,
        });
    }
    Ok(())
}

/// Conditional decrement: a concurrent checkout that got there first leaves no row to update,
/// which is reported as insufficient stock instead of driving the counter negative.
async fn decrement_stock(txn: &DatabaseTransaction, line: &CartLine) -> Result<(), CheckoutError> {
    let quantity = line.item.quantity;
    let result = product_size::Entity::update_many()
        .col_expr(
            product_size::Column::Stock,
            Expr::col(product_size::Column::Stock).sub(quantity),
        )
        .filter(product_size::Column::Id.eq(line.product_size.id))
        .filter(product_size::Column::Stock.gte(quantity))
        .exec(txn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    let available = product_size::Entity::find_by_id(line.product_size.id)
        .one(txn)
        .await?
        .map(|row| row.stock)
        .unwrap_or(0);
    Err(CheckoutError::InsufficientStock {
        product: line.product.name.clone(),
        size: line.size_name.clone(),
        requested: quantity,
        available,
    })
}

fn random_order_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ORDER_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

async fn unused_order_code(txn: &DatabaseTransaction) -> Result<String, DbErr> {
    loop {
        let code = random_order_code();
        let taken = order::Entity::find()
            .filter(order::Column::OrderCode.eq(&code))
            .one(txn)
            .await?
            .is_some();
        if !taken {
            return Ok(code);
        }
    }
}
