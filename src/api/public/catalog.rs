use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::entities::{
    category,
    product::{self, ProductCondition},
    product_moderation::{self, ModerationStatus},
    product_size, size,
};
use crate::middleware::logging::ApiError;

const DEFAULT_PAGE_SIZE: u64 = 12;
const MAX_PAGE_SIZE: u64 = 48;
const RELATED_PRODUCTS: u64 = 4;

pub fn catalog_router() -> Router {
    Router::new()
        .route("/category", get(get_categories))
        .route("/size", get(get_sizes))
        .route("/product", get(get_products))
        .route("/product/:slug", get(get_product))
}

async fn get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .all(&*db)
        .await?;
    Ok(Json(categories))
}

async fn get_sizes(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let sizes = size::Entity::find()
        .order_by_asc(size::Column::Id)
        .all(&*db)
        .await?;
    Ok(Json(sizes))
}

/// Products a visitor may see: approved by a moderator and currently on sale.
fn on_sale() -> Select<product::Entity> {
    product::Entity::find()
        .inner_join(product_moderation::Entity)
        .filter(product_moderation::Column::Status.eq(ModerationStatus::Approved))
        .filter(product::Column::IsActive.eq(true))
}

async fn get_products(
    Query(params): Query<GetProductsQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut query = on_sale();

    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(product::Column::Name.contains(q))
                .add(product::Column::Description.contains(q)),
        );
    }
    if let Some(color) = params.color.as_deref().filter(|v| !v.is_empty()) {
        query = query.filter(product::Column::Color.contains(color));
    }
    if let Some(material) = params.material.as_deref().filter(|v| !v.is_empty()) {
        query = query.filter(product::Column::Material.contains(material));
    }
    if let Some(brand) = params.brand.as_deref().filter(|v| !v.is_empty()) {
        query = query.filter(product::Column::Brand.contains(brand));
    }
    if let Some(condition) = params.condition {
        query = query.filter(product::Column::Condition.eq(condition));
    }
    if let Some(slug) = params.category.as_deref().filter(|v| !v.is_empty()) {
        let category_id = category::Entity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&*db)
            .await?
            .map(|category| category.id);
        // Unknown category: nothing matches.
        query = query.filter(product::Column::CategoryId.eq(category_id.unwrap_or(-1)));
    }
    if let Some(size_name) = params.size.as_deref().filter(|v| !v.is_empty()) {
        let product_ids: Vec<i32> = product_size::Entity::find()
            .inner_join(size::Entity)
            .filter(size::Column::Name.eq(size_name))
            .filter(product_size::Column::Stock.gt(0))
            .all(&*db)
            .await?
            .into_iter()
            .map(|row| row.product_id)
            .collect();
        query = query.filter(product::Column::Id.is_in(product_ids));
    }

    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = params.page.unwrap_or(1).max(1);

    let paginator = query
        .order_by_desc(product::Column::CreatedAt)
        .order_by_desc(product::Column::Id)
        .paginate(&*db, page_size);
    let totals = paginator.num_items_and_pages().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(Json(json!({
        "items": items,
        "page": page,
        "page_size": page_size,
        "total_items": totals.number_of_items,
        "total_pages": totals.number_of_pages,
    })))
}

async fn get_product(
    Path(slug): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let product = product::Entity::find()
        .inner_join(product_moderation::Entity)
        .filter(product_moderation::Column::Status.eq(ModerationStatus::Approved))
        .filter(product::Column::Slug.eq(&slug))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product '{slug}' was found")))?;

    let category = category::Entity::find_by_id(product.category_id)
        .one(&*db)
        .await?;

    let sizes: Vec<SizeEntry> = product_size::Entity::find()
        .filter(product_size::Column::ProductId.eq(product.id))
        .find_also_related(size::Entity)
        .order_by_asc(product_size::Column::Id)
        .all(&*db)
        .await?
        .into_iter()
        .map(|(row, size)| SizeEntry {
            product_size_id: row.id,
            size: size.map(|size| size.name).unwrap_or_default(),
            stock: row.stock,
        })
        .collect();

    let related = on_sale()
        .filter(product::Column::CategoryId.eq(product.category_id))
        .filter(product::Column::Id.ne(product.id))
        .order_by_desc(product::Column::CreatedAt)
        .limit(RELATED_PRODUCTS)
        .all(&*db)
        .await?;

    Ok(Json(json!({
        "available": product.is_available(),
        "product": product,
        "category": category,
        "sizes": sizes,
        "related": related,
    })))
}

#[derive(Deserialize)]
struct GetProductsQuery {
    q: Option<String>,
    color: Option<String>,
    size: Option<String>,
    material: Option<String>,
    brand: Option<String>,
    condition: Option<ProductCondition>,
    category: Option<String>,
    page: Option<u64>,
    page_size: Option<u64>,
}

#[derive(Serialize)]
struct SizeEntry {
    product_size_id: i32,
    size: String,
    stock: i32,
}
