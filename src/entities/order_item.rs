use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One cart line frozen at checkout. Names and unit price are copied so later edits or
/// deletion of the listing leave the order untouched.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "order_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub order_id: i32,
    pub product_id: Option<i32>,
    pub product_size_id: Option<i32>,
    pub product_name: String,
    pub size_name: String,
    pub quantity: i32,
    pub price_cents: i64,
}

impl Model {
    pub fn total_price_cents(&self) -> i64 {
        self.price_cents * i64::from(self.quantity)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::product_size::Entity",
        from = "Column::ProductSizeId",
        to = "super::product_size::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    ProductSize,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
