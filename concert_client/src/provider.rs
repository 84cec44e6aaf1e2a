use crate::error::Result;
use crate::models::{RawConcert, Service};
use crate::setlistfm::SetlistFmClient;
use crate::spotify::SpotifyClient;
use crate::ticketmaster::TicketmasterClient;

/// Tagged union over the provider clients, so callers can hold a mixed list
/// and query them uniformly.
pub enum Provider {
    Ticketmaster(TicketmasterClient),
    Spotify(SpotifyClient),
    SetlistFm(SetlistFmClient),
}

impl Provider {
    pub fn service(&self) -> Service {
        match self {
            Provider::Ticketmaster(_) => Service::Ticketmaster,
            Provider::Spotify(_) => Service::Spotify,
            Provider::SetlistFm(_) => Service::SetlistFm,
        }
    }

    /// Search the wrapped service for an artist's events.
    pub async fn search(&self, artist: &str, country: Option<&str>) -> Result<Vec<RawConcert>> {
        match self {
            Provider::Ticketmaster(client) => client.search(artist, country).await,
            Provider::Spotify(client) => client.search(artist, country).await,
            Provider::SetlistFm(client) => client.search(artist, country).await,
        }
    }
}
