use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream service a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Ticketmaster,
    Spotify,
    SetlistFm,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Ticketmaster => "ticketmaster",
            Service::Spotify => "spotify",
            Service::SetlistFm => "setlistfm",
        }
    }

    pub fn all() -> [Service; 3] {
        [Service::Ticketmaster, Service::Spotify, Service::SetlistFm]
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ticketmaster" | "tm" => Ok(Service::Ticketmaster),
            "spotify" => Ok(Service::Spotify),
            "setlistfm" | "setlist" | "setlist.fm" => Ok(Service::SetlistFm),
            other => Err(format!("unknown service: {}", other)),
        }
    }
}

/// One event exactly as a service reported it, before normalization.
///
/// Fields the service did not provide are empty strings rather than options;
/// the normalizer relies on that when it builds the identity tuple. The date
/// stays in the service's own format (ISO for Ticketmaster, RFC 3339 for
/// Spotify, DD-MM-YYYY for Setlist.fm).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawConcert {
    pub service: Service,
    pub artist: String,
    pub title: String,
    pub venue: String,
    pub city: String,
    pub country: String,
    pub date: String,
    pub time: String,
    pub url: String,
    /// MusicBrainz artist id, when the service exposes one (Setlist.fm does)
    pub mbid: Option<String>,
}
