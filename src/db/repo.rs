use anyhow::{Context, Result};
use chrono::Local;
use concert_client::Service;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, IntoActiveModel, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set, Statement,
};

use super::entities::{artists, concerts, notifications, subscriptions, users};
use crate::error::AppError;
use crate::normalizer::{canonical, NormalizedConcert};

/// Outcome of an idempotent concert insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    AlreadyPresent,
}

pub struct Repo {
    db: DatabaseConnection,
}

impl Repo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await.context("Database ping failed")
    }

    // ==================== Users ====================

    /// Create or update a user (atomic upsert)
    /// On conflict: only updates username, preserves settings
    pub async fn upsert_user(&self, user_id: i64, username: Option<String>) -> Result<users::Model> {
        let now = Local::now().naive_local();

        let new_user = users::ActiveModel {
            id: Set(user_id),
            username: Set(username),
            notifications_enabled: Set(true),
            country: Set(None),
            created_at: Set(now),
            ticketmaster_enabled: Set(true),
            spotify_enabled: Set(true),
            setlistfm_enabled: Set(true),
        };

        // INSERT ... ON CONFLICT(id) DO UPDATE SET username = excluded.username
        users::Entity::insert(new_user)
            .on_conflict(
                OnConflict::column(users::Column::Id)
                    .update_column(users::Column::Username)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("Failed to upsert user")?;

        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .context("Failed to fetch upserted user")?
            .ok_or_else(|| anyhow::anyhow!("User {} not found after upsert", user_id))
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .context("Failed to get user")
    }

    /// Users whose notifications are globally enabled
    pub async fn active_users(&self) -> Result<Vec<users::Model>> {
        users::Entity::find()
            .filter(users::Column::NotificationsEnabled.eq(true))
            .all(&self.db)
            .await
            .context("Failed to get active users")
    }

    pub async fn set_notifications_enabled(
        &self,
        user_id: i64,
        enabled: bool,
    ) -> Result<users::Model> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {} not found", user_id))?;

        let mut active = user.into_active_model();
        active.notifications_enabled = Set(enabled);
        active
            .update(&self.db)
            .await
            .context("Failed to update notifications_enabled")
    }

    /// Set the user's default country filter, None clears it
    pub async fn set_country(&self, user_id: i64, country: Option<String>) -> Result<users::Model> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {} not found", user_id))?;

        let mut active = user.into_active_model();
        active.country = Set(country.map(|c| c.trim().to_uppercase()));
        active
            .update(&self.db)
            .await
            .context("Failed to update country")
    }

    pub async fn set_service_enabled(
        &self,
        user_id: i64,
        service: Service,
        enabled: bool,
    ) -> Result<users::Model> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {} not found", user_id))?;

        let mut active = user.into_active_model();
        match service {
            Service::Ticketmaster => active.ticketmaster_enabled = Set(enabled),
            Service::Spotify => active.spotify_enabled = Set(enabled),
            Service::SetlistFm => active.setlistfm_enabled = Set(enabled),
        }
        active
            .update(&self.db)
            .await
            .context("Failed to update service flag")
    }

    // ==================== Artists ====================

    /// Look up or lazily create an artist. Identity is the normalized name;
    /// the display name is kept from whoever names it first.
    pub async fn get_or_create_artist(&self, display_name: &str) -> Result<artists::Model> {
        let name = canonical(display_name);
        let now = Local::now().naive_local();

        let new_artist = artists::ActiveModel {
            name: Set(name.clone()),
            display_name: Set(display_name.trim().to_string()),
            mbid: Set(None),
            country: Set(None),
            formed_year: Set(None),
            ended_year: Set(None),
            created_at: Set(now),
            ..Default::default()
        };

        artists::Entity::insert(new_artist)
            .on_conflict(
                OnConflict::column(artists::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("Failed to upsert artist")?;

        self.get_artist_by_name(&name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Artist {} not found after upsert", name))
    }

    pub async fn get_artist_by_name(&self, name: &str) -> Result<Option<artists::Model>> {
        artists::Entity::find()
            .filter(artists::Column::Name.eq(canonical(name)))
            .one(&self.db)
            .await
            .context("Failed to get artist by name")
    }

    /// Attach a MusicBrainz id the first time a service reports one
    pub async fn set_artist_mbid(&self, artist_id: i32, mbid: &str) -> Result<()> {
        let Some(artist) = artists::Entity::find_by_id(artist_id)
            .one(&self.db)
            .await
            .context("Failed to query artist")?
        else {
            return Ok(());
        };

        if artist.mbid.is_some() {
            return Ok(());
        }

        let mut active = artist.into_active_model();
        active.mbid = Set(Some(mbid.to_string()));
        active
            .update(&self.db)
            .await
            .context("Failed to update artist mbid")?;
        Ok(())
    }

    // ==================== Subscriptions ====================

    /// Follow an artist, creating it lazily. Idempotent: following twice is
    /// a no-op thanks to the unique (user_id, artist_id) index.
    pub async fn follow(&self, user_id: i64, artist_name: &str) -> Result<artists::Model> {
        let artist = self.get_or_create_artist(artist_name).await?;
        let now = Local::now().naive_local();

        let new_sub = subscriptions::ActiveModel {
            user_id: Set(user_id),
            artist_id: Set(artist.id),
            notify: Set(true),
            created_at: Set(now),
            ..Default::default()
        };

        subscriptions::Entity::insert(new_sub)
            .on_conflict(
                OnConflict::columns([
                    subscriptions::Column::UserId,
                    subscriptions::Column::ArtistId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("Failed to upsert subscription")?;

        Ok(artist)
    }

    /// Unfollow an artist. A no-op (not an error) when the subscription, or
    /// the artist itself, does not exist. Returns whether a row was deleted.
    pub async fn unfollow(&self, user_id: i64, artist_name: &str) -> Result<bool> {
        let Some(artist) = self.get_artist_by_name(artist_name).await? else {
            return Ok(false);
        };

        let result = subscriptions::Entity::delete_many()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::ArtistId.eq(artist.id))
            .exec(&self.db)
            .await
            .context("Failed to delete subscription")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn followed_artists(&self, user_id: i64) -> Result<Vec<artists::Model>> {
        artists::Entity::find()
            .join(JoinType::InnerJoin, artists::Relation::Subscriptions.def())
            .filter(subscriptions::Column::UserId.eq(user_id))
            .order_by_asc(artists::Column::Name)
            .all(&self.db)
            .await
            .context("Failed to list followed artists")
    }

    /// Toggle per-artist notifications for a user. Returns false when the
    /// user does not follow that artist.
    pub async fn set_artist_notify(
        &self,
        user_id: i64,
        artist_name: &str,
        enabled: bool,
    ) -> Result<bool> {
        let Some(artist) = self.get_artist_by_name(artist_name).await? else {
            return Ok(false);
        };

        let result = subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::Notify, Expr::value(enabled))
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::ArtistId.eq(artist.id))
            .exec(&self.db)
            .await
            .context("Failed to update subscription notify flag")?;

        Ok(result.rows_affected > 0)
    }

    /// Distinct artists followed by at least one active user with the
    /// per-artist toggle on. This is the scheduler's work list.
    pub async fn artists_with_followers(&self) -> Result<Vec<artists::Model>> {
        artists::Entity::find()
            .join(JoinType::InnerJoin, artists::Relation::Subscriptions.def())
            .join(JoinType::InnerJoin, subscriptions::Relation::User.def())
            .filter(subscriptions::Column::Notify.eq(true))
            .filter(users::Column::NotificationsEnabled.eq(true))
            .distinct()
            .order_by_asc(artists::Column::Id)
            .all(&self.db)
            .await
            .context("Failed to list artists with followers")
    }

    // ==================== Concerts ====================

    /// Insert iff no record with this identity hash exists. The unique index
    /// on the hash column is the atomicity mechanism, not a check-then-insert.
    pub async fn store_if_new(
        &self,
        artist_id: i32,
        concert: &NormalizedConcert,
    ) -> Result<StoreOutcome> {
        let now = Local::now().naive_local();

        let new_concert = concerts::ActiveModel {
            artist_id: Set(artist_id),
            identity_hash: Set(concert.identity_hash.clone()),
            artist: Set(concert.artist.clone()),
            title: Set(concert.title.clone()),
            venue: Set(concert.venue.clone()),
            city: Set(concert.city.clone()),
            country: Set(concert.country.clone()),
            date: Set(concert.date.format("%Y-%m-%d").to_string()),
            time: Set(concert.time.clone()),
            url: Set(concert.url.clone()),
            service: Set(concert.service.to_string()),
            created_at: Set(now),
            ..Default::default()
        };

        let rows = concerts::Entity::insert(new_concert)
            .on_conflict(
                OnConflict::column(concerts::Column::IdentityHash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("Failed to insert concert")?;

        Ok(if rows > 0 {
            StoreOutcome::Inserted
        } else {
            StoreOutcome::AlreadyPresent
        })
    }

    #[allow(dead_code)]
    pub async fn get_concert_by_hash(&self, hash: &str) -> Result<Option<concerts::Model>> {
        concerts::Entity::find()
            .filter(concerts::Column::IdentityHash.eq(hash))
            .one(&self.db)
            .await
            .context("Failed to get concert by hash")
    }

    // ==================== Notifications ====================

    /// Existence check on the notification record. The pending query embeds
    /// the same predicate, this is the standalone form.
    #[allow(dead_code)]
    pub async fn has_been_notified(&self, user_id: i64, concert_id: i32) -> Result<bool> {
        let found = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::ConcertId.eq(concert_id))
            .one(&self.db)
            .await
            .context("Failed to check notification")?;
        Ok(found.is_some())
    }

    /// Record a delivery. Surfaces `DuplicateNotification` when the pair
    /// already exists; near-simultaneous runs can race here and the caller
    /// swallows it as a no-op.
    pub async fn record_notified(
        &self,
        user_id: i64,
        concert_id: i32,
    ) -> std::result::Result<(), AppError> {
        let now = Local::now().naive_local();

        let new_notification = notifications::ActiveModel {
            user_id: Set(user_id),
            concert_id: Set(concert_id),
            sent_at: Set(now),
            ..Default::default()
        };

        let rows = notifications::Entity::insert(new_notification)
            .on_conflict(
                OnConflict::columns([
                    notifications::Column::UserId,
                    notifications::Column::ConcertId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        if rows == 0 {
            return Err(AppError::DuplicateNotification {
                user_id,
                concert_id,
            });
        }

        Ok(())
    }

    /// Concerts by artists the user follows (with notifications on), not yet
    /// notified, matching the user's country filter and service flags.
    ///
    /// Concerts with an unknown (empty) country pass the country filter, a
    /// missing venue country must not hide an alert.
    pub async fn pending_notifications_for_user(
        &self,
        user: &users::Model,
    ) -> Result<Vec<concerts::Model>> {
        // Disabled services are matched against an impossible name so the
        // statement shape stays fixed
        let service_param = |service: Service| -> String {
            if user.service_enabled(service) {
                service.as_str().to_string()
            } else {
                String::new()
            }
        };

        let country = user.country.clone().unwrap_or_default();

        let stmt = Statement::from_sql_and_values(
            self.db.get_database_backend(),
            r#"
            SELECT c.* FROM concerts c
            INNER JOIN subscriptions s ON s.artist_id = c.artist_id
            WHERE s.user_id = ?
              AND s.notify = true
              AND (? = '' OR c.country = '' OR c.country = ?)
              AND c.service IN (?, ?, ?)
              AND NOT EXISTS (
                  SELECT 1 FROM notifications n
                  WHERE n.user_id = s.user_id AND n.concert_id = c.id
              )
            ORDER BY c.date ASC, c.id ASC
            "#,
            vec![
                user.id.into(),
                country.clone().into(),
                country.into(),
                service_param(Service::Ticketmaster).into(),
                service_param(Service::Spotify).into(),
                service_param(Service::SetlistFm).into(),
            ],
        );

        concerts::Model::find_by_statement(stmt)
            .all(&self.db)
            .await
            .context("Failed to compute pending notifications")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::normalizer::normalize;
    use concert_client::RawConcert;
    use sea_orm::PaginatorTrait;

    fn sample_concert(artist: &str, venue: &str, date: &str) -> NormalizedConcert {
        normalize(&RawConcert {
            service: Service::Ticketmaster,
            artist: artist.to_string(),
            title: format!("{} live", artist),
            venue: venue.to_string(),
            city: "Madrid".to_string(),
            country: "ES".to_string(),
            date: date.to_string(),
            time: String::new(),
            url: "https://example.com/e/1".to_string(),
            mbid: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn follow_is_idempotent() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, Some("u".to_string())).await.unwrap();

        let first = repo.follow(100, "Boards of Canada").await.unwrap();
        let second = repo.follow(100, "boards  of canada").await.unwrap();

        // Same lazily-created artist both times
        assert_eq!(first.id, second.id);
        assert_eq!(first.display_name, "Boards of Canada");

        let followed = repo.followed_artists(100).await.unwrap();
        assert_eq!(followed.len(), 1);

        let count = subscriptions::Entity::find().count(&repo.db).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn unfollow_never_followed_is_noop() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, None).await.unwrap();

        // Unknown artist: no error, nothing deleted
        let deleted = repo.unfollow(100, "Nobody").await.unwrap();
        assert!(!deleted);

        // Known artist the user never followed: same
        repo.upsert_user(200, None).await.unwrap();
        repo.follow(200, "Autechre").await.unwrap();
        let deleted = repo.unfollow(100, "Autechre").await.unwrap();
        assert!(!deleted);

        // The other user's subscription survives
        assert_eq!(repo.followed_artists(200).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_if_new_dedups_on_hash() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, None).await.unwrap();
        let artist = repo.follow(100, "Autechre").await.unwrap();

        let concert = sample_concert("Autechre", "La Riviera", "2025-05-01");

        let first = repo.store_if_new(artist.id, &concert).await.unwrap();
        assert_eq!(first, StoreOutcome::Inserted);

        let second = repo.store_if_new(artist.id, &concert).await.unwrap();
        assert_eq!(second, StoreOutcome::AlreadyPresent);

        let count = concerts::Entity::find().count(&repo.db).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn record_notified_roundtrip_and_duplicate() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, None).await.unwrap();
        let artist = repo.follow(100, "Plaid").await.unwrap();

        let concert = sample_concert("Plaid", "Sala But", "2025-05-02");
        repo.store_if_new(artist.id, &concert).await.unwrap();
        let stored = repo
            .get_concert_by_hash(&concert.identity_hash)
            .await
            .unwrap()
            .unwrap();

        assert!(!repo.has_been_notified(100, stored.id).await.unwrap());

        repo.record_notified(100, stored.id).await.unwrap();
        assert!(repo.has_been_notified(100, stored.id).await.unwrap());

        // Second insert surfaces DuplicateNotification and leaves one row
        let err = repo.record_notified(100, stored.id).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateNotification { .. }));

        let count = notifications::Entity::find().count(&repo.db).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn pending_notifications_respect_filters() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, None).await.unwrap();
        repo.set_country(100, Some("es".to_string())).await.unwrap();
        let artist = repo.follow(100, "Autechre").await.unwrap();

        let madrid = sample_concert("Autechre", "La Riviera", "2025-05-01");
        let mut paris = sample_concert("Autechre", "Olympia", "2025-05-03");
        paris.country = "FR".to_string();

        repo.store_if_new(artist.id, &madrid).await.unwrap();
        repo.store_if_new(artist.id, &paris).await.unwrap();

        let user = repo.get_user(100).await.unwrap().unwrap();
        let pending = repo.pending_notifications_for_user(&user).await.unwrap();

        // Country filter drops the Paris date
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].city, "madrid");

        // Notified concerts disappear from the pending set
        repo.record_notified(100, pending[0].id).await.unwrap();
        let pending = repo.pending_notifications_for_user(&user).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn pending_notifications_respect_service_flags() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, None).await.unwrap();
        let artist = repo.follow(100, "Plaid").await.unwrap();

        let concert = sample_concert("Plaid", "Sala But", "2025-06-01");
        repo.store_if_new(artist.id, &concert).await.unwrap();

        repo.set_service_enabled(100, Service::Ticketmaster, false)
            .await
            .unwrap();

        let user = repo.get_user(100).await.unwrap().unwrap();
        let pending = repo.pending_notifications_for_user(&user).await.unwrap();
        assert!(pending.is_empty());

        repo.set_service_enabled(100, Service::Ticketmaster, true)
            .await
            .unwrap();
        let user = repo.get_user(100).await.unwrap().unwrap();
        let pending = repo.pending_notifications_for_user(&user).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn pending_notifications_respect_artist_mute() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, None).await.unwrap();
        let artist = repo.follow(100, "Plaid").await.unwrap();

        let concert = sample_concert("Plaid", "Sala But", "2025-06-01");
        repo.store_if_new(artist.id, &concert).await.unwrap();

        let muted = repo.set_artist_notify(100, "Plaid", false).await.unwrap();
        assert!(muted);

        let user = repo.get_user(100).await.unwrap().unwrap();
        assert!(repo
            .pending_notifications_for_user(&user)
            .await
            .unwrap()
            .is_empty());

        // Muting an artist the user does not follow reports false
        assert!(!repo.set_artist_notify(100, "Nobody", false).await.unwrap());
    }

    #[tokio::test]
    async fn two_followers_get_independent_pending_sets() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, None).await.unwrap();
        repo.upsert_user(200, None).await.unwrap();
        let artist = repo.follow(100, "Autechre").await.unwrap();
        repo.follow(200, "Autechre").await.unwrap();

        let concert = sample_concert("Autechre", "Razzmatazz", "2025-07-01");
        repo.store_if_new(artist.id, &concert).await.unwrap();
        let stored = repo
            .get_concert_by_hash(&concert.identity_hash)
            .await
            .unwrap()
            .unwrap();

        // Notify only the first user, the second still has it pending
        repo.record_notified(100, stored.id).await.unwrap();

        let user1 = repo.get_user(100).await.unwrap().unwrap();
        let user2 = repo.get_user(200).await.unwrap().unwrap();
        assert!(repo
            .pending_notifications_for_user(&user1)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            repo.pending_notifications_for_user(&user2)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn artists_with_followers_skips_inactive_users() {
        let repo = setup_test_db().await.unwrap();
        repo.upsert_user(100, None).await.unwrap();
        repo.upsert_user(200, None).await.unwrap();
        repo.follow(100, "Autechre").await.unwrap();
        repo.follow(200, "Plaid").await.unwrap();

        // Both artists are on the work list while both users are active
        assert_eq!(repo.artists_with_followers().await.unwrap().len(), 2);

        // Disabling the only follower drops the artist
        repo.set_notifications_enabled(200, false).await.unwrap();
        let list = repo.artists_with_followers().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "autechre");

        // Two followers of the same artist yield one entry
        repo.set_notifications_enabled(200, true).await.unwrap();
        repo.follow(200, "Autechre").await.unwrap();
        let list = repo.artists_with_followers().await.unwrap();
        assert_eq!(list.len(), 2);
    }
}
