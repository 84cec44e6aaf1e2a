use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One stored concert. Rows are append-only: a later report with the same
/// identity hash is "already known", never a merge.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "concerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub artist_id: i32,
    /// md5 hex over the normalized (artist, venue, city, date) tuple
    #[sea_orm(unique)]
    pub identity_hash: String,
    pub artist: String,
    pub title: String,
    pub venue: String,
    pub city: String,
    pub country: String,
    /// Canonical ISO date (YYYY-MM-DD)
    pub date: String,
    pub time: String,
    pub url: String,
    /// Service that reported it first
    pub service: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::artists::Entity",
        from = "Column::ArtistId",
        to = "super::artists::Column::Id"
    )]
    Artist,
    #[sea_orm(has_many = "super::notifications::Entity")]
    Notifications,
}

impl Related<super::artists::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Artist.def()
    }
}

impl Related<super::notifications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
