pub mod api;
pub mod config;
pub mod entities;
pub mod middleware;
pub mod services;

use sea_orm::{DatabaseConnection, DbErr};
use tracing::info;

use crate::config::AppConfig;
use crate::entities::{connect, primary_settup, setup_schema};

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "campus_market=info,tower_http=info";

/// Opens the pool, creates missing tables and seeds an empty database when configured to.
pub async fn init_database(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let db = connect(config).await?;
    setup_schema(&db).await?;
    info!("Database schema is ready");

    if config.seed_database {
        primary_settup(&db, config).await?;
    }
    Ok(db)
}
