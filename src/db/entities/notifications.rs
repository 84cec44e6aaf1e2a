use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery record. The unique (user_id, concert_id) index is what prevents
/// duplicate alerts across scheduler runs.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i64,
    pub concert_id: i32,
    pub sent_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::concerts::Entity",
        from = "Column::ConcertId",
        to = "super::concerts::Column::Id"
    )]
    Concert,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::concerts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Concert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
