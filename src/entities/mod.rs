pub mod cart;
pub mod cart_item;
pub mod category;
pub mod chat;
pub mod message;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_moderation;
pub mod product_size;
pub mod size;
pub mod user;
pub mod wishlist;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{
    sea_query::{Index, IndexCreateStatement},
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, Schema, Set, TransactionTrait,
};
use tracing::info;

use crate::config::AppConfig;
use crate::services::listing::slugify;

pub async fn connect(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.max_connections)
        .sqlx_logging(false);

    Database::connect(options).await
}

pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Referenced tables first.
    let mut tables = vec![
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(category::Entity),
        schema.create_table_from_entity(size::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(product_size::Entity),
        schema.create_table_from_entity(product_moderation::Entity),
        schema.create_table_from_entity(cart::Entity),
        schema.create_table_from_entity(cart_item::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_item::Entity),
        schema.create_table_from_entity(chat::Entity),
        schema.create_table_from_entity(message::Entity),
        schema.create_table_from_entity(wishlist::Entity),
    ];

    for table in tables.iter_mut() {
        db.execute(backend.build(table.if_not_exists())).await?;
    }

    for index in unique_indexes() {
        db.execute(backend.build(&index)).await?;
    }

    Ok(())
}

/// Uniqueness that spans more than one column.
fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_product_size_product_size")
            .table(product_size::Entity)
            .col(product_size::Column::ProductId)
            .col(product_size::Column::SizeId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_cart_item_cart_size")
            .table(cart_item::Entity)
            .col(cart_item::Column::CartId)
            .col(cart_item::Column::ProductSizeId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_chat_participants")
            .table(chat::Entity)
            .col(chat::Column::FirstUserId)
            .col(chat::Column::SecondUserId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_wishlist_user_product")
            .table(wishlist::Entity)
            .col(wishlist::Column::UserId)
            .col(wishlist::Column::ProductId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

const SEED_SIZES: [&str; 6] = [size::ONE_SIZE, "XS", "S", "M", "L", "XL"];
const SEED_CATEGORIES: [&str; 4] = ["Clothing", "Shoes", "Accessories", "Books"];

/// Fills an empty database with staff accounts, the default sizes and a few categories.
pub async fn primary_settup(db: &DatabaseConnection, config: &AppConfig) -> Result<(), DbErr> {
    if user::Entity::find().count(db).await? > 0 {
        info!("Database already seeded, skipping");
        return Ok(());
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(config.seed_password.as_bytes(), &salt)
        .map_err(|err| DbErr::Custom(format!("Failed to hash seed password: {err}")))?
        .to_string();

    let now = Utc::now();
    let seed_user = |email: &str, first_name: &str, role: user::Role| user::ActiveModel {
        email: Set(email.to_owned()),
        password: Set(password_hash.clone()),
        first_name: Set(first_name.to_owned()),
        last_name: Set("Campus".to_owned()),
        phone: Set(String::new()),
        company: Set(String::new()),
        address1: Set(String::new()),
        address2: Set(String::new()),
        city: Set(String::new()),
        country: Set(String::new()),
        province: Set(String::new()),
        postal_code: Set(String::new()),
        role: Set(role),
        created_at: Set(now),
        ..Default::default()
    };

    let users = [
        seed_user("admin@campus.local", "Admin", user::Role::Admin),
        seed_user("moderator@campus.local", "Moderator", user::Role::Moderator),
        seed_user("user@campus.local", "User", user::Role::User),
    ];
    let sizes = SEED_SIZES.map(|name| size::ActiveModel {
        name: Set(name.to_owned()),
        ..Default::default()
    });
    let categories = SEED_CATEGORIES.map(|name| category::ActiveModel {
        name: Set(name.to_owned()),
        slug: Set(slugify(name)),
        ..Default::default()
    });

    let txn = db.begin().await?;
    let seeded = async {
        user::Entity::insert_many(users).exec(&txn).await?;
        size::Entity::insert_many(sizes).exec(&txn).await?;
        category::Entity::insert_many(categories).exec(&txn).await?;
        Ok::<_, DbErr>(())
    }
    .await;

    match seeded {
        Ok(()) => {
            txn.commit().await?;
            info!("Seeded staff accounts, sizes and categories");
            Ok(())
        }
        Err(err) => {
            let _ = txn.rollback().await;
            Err(err)
        }
    }
}
