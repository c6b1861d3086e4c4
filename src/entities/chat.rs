use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A thread between exactly two users, stored as an ordered pair so each pair has one row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "chat")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub first_user_id: i32,
    #[sea_orm(indexed)]
    pub second_user_id: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn has_participant(&self, user_id: i32) -> bool {
        self.first_user_id == user_id || self.second_user_id == user_id
    }

    pub fn other_participant(&self, user_id: i32) -> i32 {
        if self.first_user_id == user_id {
            self.second_user_id
        } else {
            self.first_user_id
        }
    }
}

/// Orders two participant ids the way they are stored.
pub fn participant_pair(a: i32, b: i32) -> (i32, i32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FirstUserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    FirstUser,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SecondUserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    SecondUser,
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
