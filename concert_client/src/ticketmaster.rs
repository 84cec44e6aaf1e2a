//! Ticketmaster Discovery API client.

use crate::error::{Error, Result};
use crate::models::{RawConcert, Service};
use serde::Deserialize;
use std::time::Duration;

const DISCOVERY_HOST: &str = "https://app.ticketmaster.com";

pub struct TicketmasterClient {
    client: reqwest::Client,
    api_key: String,
}

impl TicketmasterClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }

    /// Search upcoming events for an artist, optionally restricted to a
    /// country (ISO 3166-1 alpha-2).
    pub async fn search(&self, artist: &str, country: Option<&str>) -> Result<Vec<RawConcert>> {
        let url = format!("{}/discovery/v2/events.json", DISCOVERY_HOST);

        let mut params = vec![
            ("apikey", self.api_key.clone()),
            ("keyword", artist.to_string()),
            ("classificationName", "music".to_string()),
            ("size", "50".to_string()),
        ];
        if let Some(cc) = country {
            params.push(("countryCode", cc.to_string()));
        }

        let response = self.client.get(&url).query(&params).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                message: text,
                status: status.as_u16(),
            });
        }

        let page: EventsResponse = serde_json::from_str(&text)?;
        let events = page.embedded.map(|e| e.events).unwrap_or_default();

        tracing::debug!("Ticketmaster returned {} events for {}", events.len(), artist);

        Ok(events
            .into_iter()
            .map(|event| event.into_raw(artist))
            .collect())
    }
}

// Wire format. Only the fields this project reads, the Discovery API
// returns far more.

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<Embedded>,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    name: String,
    #[serde(default)]
    url: Option<String>,
    dates: Dates,
    #[serde(rename = "_embedded")]
    embedded: Option<EventEmbedded>,
}

#[derive(Debug, Deserialize)]
struct Dates {
    start: Start,
}

#[derive(Debug, Deserialize)]
struct Start {
    #[serde(rename = "localDate", default)]
    local_date: Option<String>,
    #[serde(rename = "localTime", default)]
    local_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventEmbedded {
    #[serde(default)]
    venues: Vec<Venue>,
    #[serde(default)]
    attractions: Vec<Attraction>,
}

#[derive(Debug, Deserialize)]
struct Venue {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    city: Option<City>,
    #[serde(default)]
    country: Option<Country>,
}

#[derive(Debug, Deserialize)]
struct City {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Country {
    #[serde(rename = "countryCode")]
    country_code: String,
}

#[derive(Debug, Deserialize)]
struct Attraction {
    name: String,
}

impl Event {
    fn into_raw(self, query_artist: &str) -> RawConcert {
        let (venue, city, country) = match self
            .embedded
            .as_ref()
            .and_then(|e| e.venues.first())
        {
            Some(v) => (
                v.name.clone().unwrap_or_default(),
                v.city.as_ref().map(|c| c.name.clone()).unwrap_or_default(),
                v.country
                    .as_ref()
                    .map(|c| c.country_code.clone())
                    .unwrap_or_default(),
            ),
            None => (String::new(), String::new(), String::new()),
        };

        // The event's headline attraction is a better artist name than the
        // search keyword, which Ticketmaster matches fuzzily
        let artist = self
            .embedded
            .as_ref()
            .and_then(|e| e.attractions.first())
            .map(|a| a.name.clone())
            .unwrap_or_else(|| query_artist.to_string());

        RawConcert {
            service: Service::Ticketmaster,
            artist,
            title: self.name,
            venue,
            city,
            country,
            date: self.dates.start.local_date.unwrap_or_default(),
            time: self.dates.start.local_time.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            mbid: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_JSON: &str = r#"{
        "name": "Boards of Canada - World Tour",
        "url": "https://www.ticketmaster.es/event/123",
        "dates": { "start": { "localDate": "2025-05-01", "localTime": "20:30:00" } },
        "_embedded": {
            "venues": [{
                "name": "La Riviera",
                "city": { "name": "Madrid" },
                "country": { "countryCode": "ES" }
            }],
            "attractions": [{ "name": "Boards of Canada" }]
        }
    }"#;

    #[test]
    fn event_maps_to_raw_concert() {
        let event: Event = serde_json::from_str(EVENT_JSON).unwrap();
        let raw = event.into_raw("boards of canada");

        assert_eq!(raw.service, Service::Ticketmaster);
        assert_eq!(raw.artist, "Boards of Canada");
        assert_eq!(raw.venue, "La Riviera");
        assert_eq!(raw.city, "Madrid");
        assert_eq!(raw.country, "ES");
        assert_eq!(raw.date, "2025-05-01");
        assert_eq!(raw.time, "20:30:00");
        assert!(raw.mbid.is_none());
    }

    #[test]
    fn event_without_venue_keeps_empty_fields() {
        let event: Event = serde_json::from_str(
            r#"{ "name": "TBA", "dates": { "start": {} } }"#,
        )
        .unwrap();
        let raw = event.into_raw("someone");

        assert_eq!(raw.artist, "someone");
        assert_eq!(raw.venue, "");
        assert_eq!(raw.date, "");
    }

    #[test]
    fn empty_page_parses_to_no_events() {
        let page: EventsResponse = serde_json::from_str(r#"{"page": {"totalElements": 0}}"#).unwrap();
        assert!(page.embedded.is_none());
    }
}
