use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub user_id: i32,
    #[sea_orm(unique)]
    pub order_code: String,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: String,
    pub phone: String,
    pub delivery_address: DeliveryAddress,
    pub group_number: String,
    pub email: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub special_instructions: String,
    pub total_price_cents: i64,
    pub status: Status,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    enum_name = "status_enum",
    db_type = "String(StringLen::N(16))",
    rs_type = "String"
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl Status {
    /// Orders move forward one step at a time; cancelling is only possible before shipping.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Processing)
                | (Status::Processing, Status::Shipped)
                | (Status::Shipped, Status::Delivered)
                | (Status::Pending, Status::Cancelled)
                | (Status::Processing, Status::Cancelled)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        f.write_str(value)
    }
}

/// Pick-up points buyers choose from at checkout.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    enum_name = "delivery_address_enum",
    db_type = "String(StringLen::N(20))",
    rs_type = "String"
)]
pub enum DeliveryAddress {
    #[sea_orm(string_value = "address_1")]
    #[serde(rename = "address_1")]
    Address1,
    #[sea_orm(string_value = "address_2")]
    #[serde(rename = "address_2")]
    Address2,
    #[sea_orm(string_value = "address_3")]
    #[serde(rename = "address_3")]
    Address3,
}

impl DeliveryAddress {
    pub fn full_text(self) -> &'static str {
        match self {
            DeliveryAddress::Address1 => "Russia, Chelyabinsk, Komsomolsky prospekt 113a",
            DeliveryAddress::Address2 => "Russia, Chelyabinsk, Kozhzavodskaya street 1",
            DeliveryAddress::Address3 => "Russia, Chelyabinsk, Komarovskogo street 9A",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Status::{self, *};

    #[test]
    fn forward_path() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
    }

    #[test]
    fn no_skipping_or_going_back() {
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Delivered.can_transition_to(Pending));
    }

    #[test]
    fn cancel_only_before_shipping() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn status_names_match_stored_values() {
        assert_eq!(Cancelled.to_string(), "cancelled");
        assert_eq!(Shipped.to_string(), "shipped");
    }
}
