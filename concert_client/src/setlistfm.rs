//! Setlist.fm REST API client.

use crate::error::{Error, Result};
use crate::models::{RawConcert, Service};
use serde::Deserialize;
use std::time::Duration;

const API_HOST: &str = "https://api.setlist.fm";

pub struct SetlistFmClient {
    client: reqwest::Client,
    api_key: String,
}

impl SetlistFmClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }

    /// Search recent setlists for an artist, optionally restricted to a
    /// country. Setlist.fm reports played shows, which the source treats as
    /// concert sightings like any other service's.
    pub async fn search(&self, artist: &str, country: Option<&str>) -> Result<Vec<RawConcert>> {
        let mut params = vec![
            ("artistName", artist.to_string()),
            ("p", "1".to_string()),
        ];
        if let Some(cc) = country {
            params.push(("countryCode", cc.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/rest/1.0/search/setlists", API_HOST))
            .header("x-api-key", &self.api_key)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await?;

        let status = response.status();

        // Setlist.fm answers an empty search with 404 rather than an empty page
        if status.as_u16() == 404 {
            return Ok(Vec::new());
        }

        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                message: text,
                status: status.as_u16(),
            });
        }

        let page: SetlistsResponse = serde_json::from_str(&text)?;

        tracing::debug!(
            "Setlist.fm returned {} setlists for {}",
            page.setlist.len(),
            artist
        );

        Ok(page.setlist.into_iter().map(Setlist::into_raw).collect())
    }
}

// Wire format

#[derive(Debug, Deserialize)]
struct SetlistsResponse {
    #[serde(default)]
    setlist: Vec<Setlist>,
}

#[derive(Debug, Deserialize)]
struct Setlist {
    /// DD-MM-YYYY
    #[serde(rename = "eventDate")]
    event_date: String,
    artist: SetlistArtist,
    venue: SetlistVenue,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    tour: Option<Tour>,
}

#[derive(Debug, Deserialize)]
struct SetlistArtist {
    name: String,
    #[serde(default)]
    mbid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetlistVenue {
    #[serde(default)]
    name: Option<String>,
    city: SetlistCity,
}

#[derive(Debug, Deserialize)]
struct SetlistCity {
    name: String,
    country: SetlistCountry,
}

#[derive(Debug, Deserialize)]
struct SetlistCountry {
    code: String,
}

#[derive(Debug, Deserialize)]
struct Tour {
    name: String,
}

impl Setlist {
    fn into_raw(self) -> RawConcert {
        let title = match &self.tour {
            Some(tour) => format!("{} - {}", self.artist.name, tour.name),
            None => self.artist.name.clone(),
        };

        RawConcert {
            service: Service::SetlistFm,
            artist: self.artist.name,
            title,
            venue: self.venue.name.unwrap_or_default(),
            city: self.venue.city.name,
            country: self.venue.city.country.code,
            date: self.event_date,
            time: String::new(),
            url: self.url.unwrap_or_default(),
            mbid: self.artist.mbid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setlist_maps_to_raw_concert() {
        let setlist: Setlist = serde_json::from_str(
            r#"{
                "eventDate": "01-05-2025",
                "artist": { "name": "Boards of Canada", "mbid": "69158f97-4c07-4c4e-baf8-4e4ab1ed666e" },
                "venue": { "name": "La Riviera", "city": { "name": "Madrid", "country": { "code": "ES" } } },
                "url": "https://www.setlist.fm/setlist/abc.html",
                "tour": { "name": "Societas x Tape" }
            }"#,
        )
        .unwrap();

        let raw = setlist.into_raw();
        assert_eq!(raw.service, Service::SetlistFm);
        assert_eq!(raw.artist, "Boards of Canada");
        assert_eq!(raw.title, "Boards of Canada - Societas x Tape");
        assert_eq!(raw.date, "01-05-2025");
        assert_eq!(raw.country, "ES");
        assert_eq!(
            raw.mbid.as_deref(),
            Some("69158f97-4c07-4c4e-baf8-4e4ab1ed666e")
        );
    }

    #[test]
    fn setlist_without_venue_name_keeps_empty_string() {
        let setlist: Setlist = serde_json::from_str(
            r#"{
                "eventDate": "02-05-2025",
                "artist": { "name": "Autechre" },
                "venue": { "city": { "name": "Barcelona", "country": { "code": "ES" } } }
            }"#,
        )
        .unwrap();

        let raw = setlist.into_raw();
        assert_eq!(raw.venue, "");
        assert_eq!(raw.title, "Autechre");
        assert!(raw.mbid.is_none());
    }
}
