//! Spotify client.
//!
//! Spotify has no public concerts endpoint; this uses the partner concerts
//! API with a client-credentials token, which is what the artist pages read.

use crate::error::{Error, Result};
use crate::models::{RawConcert, Service};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const ACCOUNTS_HOST: &str = "https://accounts.spotify.com";
const API_HOST: &str = "https://api.spotify.com";
const PARTNER_HOST: &str = "https://spclient.wg.spotify.com";

/// Cached access token and its expiry
#[derive(Debug, Clone)]
struct TokenInfo {
    access_token: String,
    expires_at: Instant,
}

impl TokenInfo {
    /// Refresh 60 seconds early to stay clear of the boundary
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at - Duration::from_secs(60)
    }
}

pub struct SpotifyClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<TokenInfo>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            token: RwLock::new(None),
        })
    }

    /// Fetch a client-credentials token and cache it
    async fn refresh_token(&self) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/token", ACCOUNTS_HOST))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token request failed ({}): {}",
                status, text
            )));
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in);

        let mut guard = self.token.write().await;
        *guard = Some(TokenInfo {
            access_token: token.access_token,
            expires_at,
        });

        tracing::debug!("Spotify token refreshed, expires in {}s", token.expires_in);
        Ok(())
    }

    async fn bearer_token(&self) -> Result<String> {
        let needs_refresh = {
            let guard = self.token.read().await;
            match &*guard {
                Some(info) => info.is_expired(),
                None => true,
            }
        };

        if needs_refresh {
            self.refresh_token().await?;
        }

        let guard = self.token.read().await;
        guard
            .as_ref()
            .map(|info| info.access_token.clone())
            .ok_or_else(|| Error::Auth("no access token after refresh".to_string()))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let token = self.bearer_token().await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                message: text,
                status: status.as_u16(),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Resolve an artist name to a Spotify artist id (best match)
    async fn artist_id(&self, artist: &str) -> Result<Option<String>> {
        let result: SearchResponse = self
            .get(
                &format!("{}/v1/search", API_HOST),
                &[
                    ("q", artist.to_string()),
                    ("type", "artist".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        Ok(result.artists.items.into_iter().next().map(|a| a.id))
    }

    /// Search upcoming concerts for an artist. The country filter is applied
    /// client-side since the partner endpoint has no country parameter.
    pub async fn search(&self, artist: &str, country: Option<&str>) -> Result<Vec<RawConcert>> {
        let Some(id) = self.artist_id(artist).await? else {
            tracing::debug!("Spotify knows no artist named {}", artist);
            return Ok(Vec::new());
        };

        let listing: ConcertsResponse = self
            .get(
                &format!("{}/concerts/v2/concerts/artist/{}", PARTNER_HOST, id),
                &[],
            )
            .await?;

        tracing::debug!(
            "Spotify returned {} concerts for {}",
            listing.concerts.len(),
            artist
        );

        Ok(listing
            .concerts
            .into_iter()
            .filter(|c| match country {
                Some(cc) => c.location.country.eq_ignore_ascii_case(cc),
                None => true,
            })
            .map(|c| c.into_raw(artist))
            .collect())
    }
}

// Wire format

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: ArtistPage,
}

#[derive(Debug, Deserialize)]
struct ArtistPage {
    #[serde(default)]
    items: Vec<ArtistItem>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConcertsResponse {
    #[serde(default)]
    concerts: Vec<Concert>,
}

#[derive(Debug, Deserialize)]
struct Concert {
    #[serde(default)]
    title: String,
    /// RFC 3339 local start timestamp
    date: String,
    #[serde(default)]
    venue: String,
    location: Location,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
}

impl Concert {
    fn into_raw(self, query_artist: &str) -> RawConcert {
        RawConcert {
            service: Service::Spotify,
            artist: query_artist.to_string(),
            title: self.title,
            venue: self.venue,
            city: self.location.city,
            country: self.location.country,
            date: self.date,
            time: String::new(),
            url: self.url,
            mbid: None,
        }
    }
}
