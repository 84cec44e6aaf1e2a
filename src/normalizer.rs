//! Canonicalizes raw provider results into the common concert shape and
//! computes the identity hash used for deduplication.
//!
//! The hash is taken over a coarse normalized tuple (artist, venue, city,
//! date) rather than the raw title: the same real concert is routinely
//! reported by more than one service with different titles, casing and venue
//! formatting, and only the coarse tuple makes those collapse.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use concert_client::{RawConcert, Service};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A result with no parseable date cannot be deduplicated reliably and
    /// must not collide with unrelated events via an empty-date default.
    #[error("Unparseable date {date:?} in {service} result for {artist:?}")]
    UnparseableDate {
        service: Service,
        artist: String,
        date: String,
    },
}

/// A concert record in canonical form, ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedConcert {
    pub artist: String,
    pub title: String,
    pub venue: String,
    pub city: String,
    pub country: String,
    pub date: NaiveDate,
    pub time: String,
    pub url: String,
    pub service: Service,
    pub mbid: Option<String>,
    pub identity_hash: String,
}

/// Lowercase and collapse all whitespace runs to single spaces.
pub fn canonical(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// md5 hex over the normalized identity tuple.
pub fn identity_hash(artist: &str, venue: &str, city: &str, date: NaiveDate) -> String {
    let tuple = format!("{}|{}|{}|{}", artist, venue, city, date.format("%Y-%m-%d"));
    format!("{:x}", md5::compute(tuple.as_bytes()))
}

/// Map a service's own date format to a canonical date, plus the start time
/// when the service embeds one in the timestamp.
fn parse_date(service: Service, raw: &str) -> Option<(NaiveDate, Option<String>)> {
    match service {
        // Discovery API: 2025-05-01
        Service::Ticketmaster => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(|date| (date, None)),
        // Partner API: 2025-05-01T20:00:00, sometimes with an offset
        Service::Spotify => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .map(|dt| (dt.date(), Some(dt.format("%H:%M").to_string())))
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| (dt.date_naive(), Some(dt.format("%H:%M").to_string())))
            }),
        // Setlist.fm: 01-05-2025
        Service::SetlistFm => NaiveDate::parse_from_str(raw, "%d-%m-%Y")
            .ok()
            .map(|date| (date, None)),
    }
}

/// Convert one raw result into a [`NormalizedConcert`].
///
/// Missing optional fields become empty strings, not nulls, so the hash
/// stays deterministic. A record whose date cannot be parsed is rejected.
pub fn normalize(raw: &RawConcert) -> Result<NormalizedConcert, NormalizeError> {
    let date_str = raw.date.trim();

    let Some((date, embedded_time)) = parse_date(raw.service, date_str) else {
        return Err(NormalizeError::UnparseableDate {
            service: raw.service,
            artist: raw.artist.clone(),
            date: raw.date.clone(),
        });
    };

    let artist = canonical(&raw.artist);
    let venue = canonical(&raw.venue);
    let city = canonical(&raw.city);

    let time = match embedded_time {
        Some(t) => t,
        None => raw.time.trim().to_string(),
    };

    let identity_hash = identity_hash(&artist, &venue, &city, date);

    Ok(NormalizedConcert {
        artist,
        title: raw.title.trim().to_string(),
        venue,
        city,
        country: raw.country.trim().to_uppercase(),
        date,
        time,
        url: raw.url.trim().to_string(),
        service: raw.service,
        mbid: raw.mbid.clone(),
        identity_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(service: Service, artist: &str, venue: &str, city: &str, date: &str) -> RawConcert {
        RawConcert {
            service,
            artist: artist.to_string(),
            title: format!("{} live", artist),
            venue: venue.to_string(),
            city: city.to_string(),
            country: "ES".to_string(),
            date: date.to_string(),
            time: String::new(),
            url: String::new(),
            mbid: None,
        }
    }

    #[test]
    fn same_concert_from_two_services_hashes_identically() {
        // Differing casing, whitespace and title, same real-world event
        let a = normalize(&raw(
            Service::Ticketmaster,
            "Boards of Canada",
            "La  Riviera",
            "Madrid",
            "2025-05-01",
        ))
        .unwrap();
        let b = normalize(&raw(
            Service::SetlistFm,
            "boards  of canada",
            "LA RIVIERA",
            " madrid ",
            "01-05-2025",
        ))
        .unwrap();

        assert_eq!(a.identity_hash, b.identity_hash);
        assert_eq!(a.date, b.date);
    }

    #[test]
    fn different_venue_changes_hash() {
        let a = normalize(&raw(
            Service::Ticketmaster,
            "Autechre",
            "Razzmatazz",
            "Barcelona",
            "2025-06-10",
        ))
        .unwrap();
        let b = normalize(&raw(
            Service::Ticketmaster,
            "Autechre",
            "Apolo",
            "Barcelona",
            "2025-06-10",
        ))
        .unwrap();

        assert_ne!(a.identity_hash, b.identity_hash);
    }

    #[test]
    fn spotify_timestamp_yields_date_and_time() {
        let concert = normalize(&raw(
            Service::Spotify,
            "Plaid",
            "Sala But",
            "Madrid",
            "2025-05-01T20:30:00",
        ))
        .unwrap();

        assert_eq!(concert.date, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
        assert_eq!(concert.time, "20:30");
    }

    #[test]
    fn unparseable_date_is_rejected() {
        let err = normalize(&raw(Service::Ticketmaster, "Plaid", "Sala But", "Madrid", ""))
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UnparseableDate { .. }));

        let err = normalize(&raw(Service::SetlistFm, "Plaid", "", "", "2025-05-01")).unwrap_err();
        assert!(matches!(err, NormalizeError::UnparseableDate { .. }));
    }

    #[test]
    fn missing_venue_defaults_to_empty_not_null() {
        let concert =
            normalize(&raw(Service::Ticketmaster, "Plaid", "", "", "2025-05-01")).unwrap();
        assert_eq!(concert.venue, "");
        assert_eq!(concert.city, "");
        // Still deduplicates against an equally sparse record
        assert_eq!(
            concert.identity_hash,
            identity_hash("plaid", "", "", concert.date)
        );
    }

    #[test]
    fn country_is_uppercased() {
        let mut r = raw(Service::Ticketmaster, "Plaid", "X", "Y", "2025-05-01");
        r.country = "es".to_string();
        assert_eq!(normalize(&r).unwrap().country, "ES");
    }
}
