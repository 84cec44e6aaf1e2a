use crate::bot::notifier::{Channel, Notifier};
use crate::db::entities::artists;
use crate::db::repo::{Repo, StoreOutcome};
use crate::error::AppError;
use crate::normalizer;
use anyhow::Result;
use chrono::{Local, TimeZone};
use concert_client::{Provider, RawConcert};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Drives the daily discovery-and-notify cycle:
/// collect raw results per followed artist, normalize, store new concerts,
/// then deliver pending notifications per user.
pub struct SearchEngine<C: Channel> {
    repo: Arc<Repo>,
    providers: Arc<Vec<Provider>>,
    notifier: Notifier<C>,
    run_hour: u32,
    run_minute: u32,
    worker_count: usize,
    search_attempts: u32,
    search_country: Option<String>,
}

impl<C: Channel> SearchEngine<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<Repo>,
        providers: Vec<Provider>,
        notifier: Notifier<C>,
        run_hour: u32,
        run_minute: u32,
        worker_count: usize,
        search_attempts: u32,
        search_country: Option<String>,
    ) -> Self {
        Self {
            repo,
            providers: Arc::new(providers),
            notifier,
            run_hour,
            run_minute,
            worker_count: worker_count.max(1),
            search_attempts: search_attempts.max(1),
            search_country,
        }
    }

    /// Main scheduler loop - runs indefinitely at the specified time daily
    pub async fn run(&self) {
        info!(
            "🚀 Search engine started (run time: {:02}:{:02}, {} workers)",
            self.run_hour, self.run_minute, self.worker_count
        );

        loop {
            let next_run = self.calculate_next_run_time();
            let now = Local::now();
            let duration_until_run = (next_run - now).to_std().unwrap_or_default();

            info!(
                "⏰ Next search run at: {} (in {} seconds)",
                next_run.format("%Y-%m-%d %H:%M:%S"),
                duration_until_run.as_secs()
            );

            sleep(duration_until_run).await;

            if let Err(e) = self.run_cycle().await {
                error!("Search cycle error: {:#}", e);
            }

            // Avoid running twice in the same minute
            sleep(Duration::from_secs(60)).await;
        }
    }

    fn calculate_next_run_time(&self) -> chrono::DateTime<Local> {
        next_run_at(self.run_hour, self.run_minute)
    }

    /// One full cycle: search every followed artist, then notify every
    /// active user.
    pub async fn run_cycle(&self) -> Result<()> {
        let artists = self.repo.artists_with_followers().await?;

        if artists.is_empty() {
            info!("No followed artists, nothing to search");
            return Ok(());
        }

        info!("🔎 Searching {} artists", artists.len());

        // Artists share no mutable state except the store, whose
        // insert-if-absent operations are the sole synchronization point,
        // so they can be searched concurrently up to the worker cap.
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut workers = JoinSet::new();

        for artist in artists {
            let semaphore = Arc::clone(&semaphore);
            let repo = Arc::clone(&self.repo);
            let providers = Arc::clone(&self.providers);
            let attempts = self.search_attempts;
            let country = self.search_country.clone();

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                search_artist(&repo, &providers, &artist, attempts, country.as_deref()).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Search worker panicked: {:#}", e);
            }
        }

        self.notify_pending().await?;

        Ok(())
    }

    /// Deliver pending notifications for every active user. A failed
    /// delivery is left unrecorded so the next cycle retries it.
    pub async fn notify_pending(&self) -> Result<()> {
        let users = self.repo.active_users().await?;

        for user in users {
            let pending = match self.repo.pending_notifications_for_user(&user).await {
                Ok(pending) => pending,
                Err(e) => {
                    error!("Failed to compute pending set for user {}: {:#}", user.id, e);
                    continue;
                }
            };

            if pending.is_empty() {
                continue;
            }

            info!("📣 {} pending notifications for user {}", pending.len(), user.id);

            for concert in pending {
                match self.notifier.notify(user.id, &concert).await {
                    Ok(()) => match self.repo.record_notified(user.id, concert.id).await {
                        Ok(()) => {}
                        // Another run got there first, the alert was sent either way
                        Err(AppError::DuplicateNotification { .. }) => {}
                        Err(e) => {
                            error!(
                                "Failed to record notification for user {} concert {}: {:#}",
                                user.id, concert.id, e
                            );
                        }
                    },
                    Err(e) => {
                        // Better to risk a duplicate than to drop an alert
                        warn!(
                            "Delivery to user {} failed for concert {}: {:#}, will retry next cycle",
                            user.id, concert.id, e
                        );
                    }
                }

                // Pace sends, Telegram throttles bursts
                sleep(Duration::from_millis(500)).await;
            }
        }

        Ok(())
    }

    /// Normalize and store one artist's raw results. Exposed for the cycle
    /// tests, the live path goes through [`Self::run_cycle`].
    pub async fn ingest_results(&self, artist: &artists::Model, results: Vec<RawConcert>) {
        ingest_results(&self.repo, artist, results).await;
    }
}

/// Next occurrence of a wall-clock time: today if it has not passed yet,
/// otherwise tomorrow.
fn next_run_at(hour: u32, minute: u32) -> chrono::DateTime<Local> {
    let now = Local::now();
    let today = now.date_naive();

    let today_run = today.and_hms_opt(hour, minute, 0).unwrap();
    let today_run_time = Local.from_local_datetime(&today_run).single().unwrap();

    if now < today_run_time {
        today_run_time
    } else {
        let tomorrow = today + chrono::Duration::days(1);
        let tomorrow_run = tomorrow.and_hms_opt(hour, minute, 0).unwrap();
        Local.from_local_datetime(&tomorrow_run).single().unwrap()
    }
}

/// Query every provider for one artist, isolating failures per service.
async fn search_artist(
    repo: &Repo,
    providers: &[Provider],
    artist: &artists::Model,
    attempts: u32,
    country: Option<&str>,
) {
    for provider in providers {
        let results =
            match search_with_retry(provider, &artist.display_name, country, attempts).await {
                Ok(results) => results,
                Err(e) => {
                    // Skip this service for this artist this cycle only,
                    // tomorrow's run retries naturally
                    warn!(
                        "{} search failed for {}: {:#}, skipping this cycle",
                        provider.service(),
                        artist.name,
                        e
                    );
                    continue;
                }
            };

        ingest_results(repo, artist, results).await;
    }
}

async fn search_with_retry(
    provider: &Provider,
    artist: &str,
    country: Option<&str>,
    attempts: u32,
) -> concert_client::Result<Vec<RawConcert>> {
    let mut attempt = 1;
    loop {
        match provider.search(artist, country).await {
            Ok(results) => return Ok(results),
            Err(e) if attempt < attempts => {
                warn!(
                    "{} search for {} failed (attempt {}/{}): {:#}",
                    provider.service(),
                    artist,
                    attempt,
                    attempts,
                    e
                );
                attempt += 1;
                sleep(Duration::from_secs(2)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn ingest_results(repo: &Repo, artist: &artists::Model, results: Vec<RawConcert>) {
    let mut inserted = 0usize;

    for raw in results {
        let service = raw.service;

        let concert = match normalizer::normalize(&raw) {
            Ok(concert) => concert,
            Err(e) => {
                // Without a date the record cannot be deduplicated, drop it
                warn!("Rejected {} result for {}: {}", service, artist.name, e);
                continue;
            }
        };

        if let Some(mbid) = &concert.mbid {
            if let Err(e) = repo.set_artist_mbid(artist.id, mbid).await {
                warn!("Failed to attach mbid to artist {}: {:#}", artist.name, e);
            }
        }

        match repo.store_if_new(artist.id, &concert).await {
            Ok(StoreOutcome::Inserted) => inserted += 1,
            Ok(StoreOutcome::AlreadyPresent) => {}
            Err(e) => {
                error!(
                    "Failed to store concert for {} from {}: {:#}",
                    artist.name, service, e
                );
            }
        }
    }

    if inserted > 0 {
        info!("💾 Stored {} new concerts for {}", inserted, artist.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use concert_client::Service;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory channel that can be told to fail deliveries
    #[derive(Clone, Default)]
    struct MockChannel {
        sent: Arc<Mutex<Vec<(i64, String)>>>,
        failing: Arc<AtomicBool>,
    }

    impl MockChannel {
        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl Channel for MockChannel {
        fn send(
            &self,
            chat_id: i64,
            text: String,
        ) -> impl std::future::Future<Output = Result<()>> + Send {
            let sent = Arc::clone(&self.sent);
            let failing = self.failing.load(Ordering::SeqCst);
            async move {
                if failing {
                    anyhow::bail!("channel unreachable");
                }
                sent.lock().unwrap().push((chat_id, text));
                Ok(())
            }
        }
    }

    fn engine(repo: Arc<Repo>, channel: MockChannel) -> SearchEngine<MockChannel> {
        SearchEngine::new(repo, Vec::new(), Notifier::new(channel), 9, 0, 2, 1, None)
    }

    fn raw(service: Service, artist: &str, title: &str, date: &str) -> RawConcert {
        RawConcert {
            service,
            artist: artist.to_string(),
            title: title.to_string(),
            venue: "La Riviera".to_string(),
            city: "Madrid".to_string(),
            country: "ES".to_string(),
            date: date.to_string(),
            time: String::new(),
            url: "https://example.com/e/1".to_string(),
            mbid: None,
        }
    }

    #[tokio::test]
    async fn same_event_from_two_services_notifies_once() {
        let repo = Arc::new(setup_test_db().await.unwrap());
        let channel = MockChannel::default();
        let engine = engine(Arc::clone(&repo), channel.clone());

        repo.upsert_user(100, None).await.unwrap();
        let artist = repo.follow(100, "Boards of Canada").await.unwrap();

        // Same real-world event, different titles and date formats
        engine
            .ingest_results(
                &artist,
                vec![
                    raw(
                        Service::Ticketmaster,
                        "Boards of Canada",
                        "Boards of Canada - World Tour",
                        "2025-05-01",
                    ),
                    raw(
                        Service::SetlistFm,
                        "BOARDS OF CANADA",
                        "Boards of Canada live in Madrid",
                        "01-05-2025",
                    ),
                ],
            )
            .await;

        engine.notify_pending().await.unwrap();

        // Exactly one stored record and one delivery
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 100);

        let user = repo.get_user(100).await.unwrap().unwrap();
        assert!(repo
            .pending_notifications_for_user(&user)
            .await
            .unwrap()
            .is_empty());

        // A later cycle seeing the same results stays quiet
        engine
            .ingest_results(
                &artist,
                vec![raw(
                    Service::Spotify,
                    "boards of canada",
                    "boards of canada",
                    "2025-05-01T21:00:00",
                )],
            )
            .await;
        engine.notify_pending().await.unwrap();
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_stays_pending() {
        let repo = Arc::new(setup_test_db().await.unwrap());
        let channel = MockChannel::default();
        let engine = engine(Arc::clone(&repo), channel.clone());

        repo.upsert_user(100, None).await.unwrap();
        let artist = repo.follow(100, "Autechre").await.unwrap();

        engine
            .ingest_results(
                &artist,
                vec![raw(Service::Ticketmaster, "Autechre", "Autechre", "2025-06-10")],
            )
            .await;

        // Simulated channel outage: nothing recorded, pair stays pending
        channel.set_failing(true);
        engine.notify_pending().await.unwrap();
        assert!(channel.sent().is_empty());

        let user = repo.get_user(100).await.unwrap().unwrap();
        let pending = repo.pending_notifications_for_user(&user).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(!repo.has_been_notified(100, pending[0].id).await.unwrap());

        // Next cycle delivers it
        channel.set_failing(false);
        engine.notify_pending().await.unwrap();
        assert_eq!(channel.sent().len(), 1);
        assert!(repo.has_been_notified(100, pending[0].id).await.unwrap());
    }

    #[tokio::test]
    async fn two_followers_notified_independently() {
        let repo = Arc::new(setup_test_db().await.unwrap());
        let channel = MockChannel::default();
        let engine = engine(Arc::clone(&repo), channel.clone());

        repo.upsert_user(100, None).await.unwrap();
        repo.upsert_user(200, None).await.unwrap();
        let artist = repo.follow(100, "Plaid").await.unwrap();
        repo.follow(200, "Plaid").await.unwrap();

        engine
            .ingest_results(
                &artist,
                vec![raw(Service::Ticketmaster, "Plaid", "Plaid", "2025-07-01")],
            )
            .await;
        engine.notify_pending().await.unwrap();

        let mut recipients: Vec<i64> = channel.sent().iter().map(|(id, _)| *id).collect();
        recipients.sort_unstable();
        assert_eq!(recipients, vec![100, 200]);

        let concert = repo
            .pending_notifications_for_user(&repo.get_user(100).await.unwrap().unwrap())
            .await
            .unwrap();
        assert!(concert.is_empty());
        let concert = repo
            .pending_notifications_for_user(&repo.get_user(200).await.unwrap().unwrap())
            .await
            .unwrap();
        assert!(concert.is_empty());
    }

    #[tokio::test]
    async fn unparseable_dates_are_dropped() {
        let repo = Arc::new(setup_test_db().await.unwrap());
        let channel = MockChannel::default();
        let engine = engine(Arc::clone(&repo), channel.clone());

        repo.upsert_user(100, None).await.unwrap();
        let artist = repo.follow(100, "Plaid").await.unwrap();

        engine
            .ingest_results(
                &artist,
                vec![
                    raw(Service::Ticketmaster, "Plaid", "Plaid (date TBA)", ""),
                    raw(Service::SetlistFm, "Plaid", "Plaid", "sometime in May"),
                ],
            )
            .await;
        engine.notify_pending().await.unwrap();

        assert!(channel.sent().is_empty());
    }

    #[test]
    fn next_run_time_is_in_the_future() {
        use chrono::Timelike;

        let now = Local::now();
        let next = next_run_at(9, 30);

        assert!(next > now);
        assert!(next - now <= chrono::Duration::days(1));
        assert_eq!(next.hour(), 9);
        assert_eq!(next.minute(), 30);
    }
}
