use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Telegram chat id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub username: Option<String>,
    #[sea_orm(default_value = true)]
    pub notifications_enabled: bool,
    /// Default country filter (ISO 3166-1 alpha-2), None means everywhere
    pub country: Option<String>,
    pub created_at: DateTime,
    #[sea_orm(default_value = true)]
    pub ticketmaster_enabled: bool,
    #[sea_orm(default_value = true)]
    pub spotify_enabled: bool,
    #[sea_orm(default_value = true)]
    pub setlistfm_enabled: bool,
}

impl Model {
    pub fn service_enabled(&self, service: concert_client::Service) -> bool {
        match service {
            concert_client::Service::Ticketmaster => self.ticketmaster_enabled,
            concert_client::Service::Spotify => self.spotify_enabled,
            concert_client::Service::SetlistFm => self.setlistfm_enabled,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscriptions::Entity")]
    Subscriptions,
    #[sea_orm(has_many = "super::notifications::Entity")]
    Notifications,
}

impl Related<super::subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl Related<super::notifications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
