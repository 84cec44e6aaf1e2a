use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "artists")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Normalized (lowercased, whitespace-collapsed) name, the lookup key
    #[sea_orm(unique)]
    pub name: String,
    /// Name as the user typed it, used in replies
    pub display_name: String,
    /// MusicBrainz id, attached when a service reports one
    pub mbid: Option<String>,
    pub country: Option<String>,
    pub formed_year: Option<i32>,
    pub ended_year: Option<i32>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscriptions::Entity")]
    Subscriptions,
    #[sea_orm(has_many = "super::concerts::Entity")]
    Concerts,
}

impl Related<super::subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl Related<super::concerts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Concerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
