//! HTTP clients for the upstream concert-data services.
//!
//! A clean wrapper around the three provider APIs, independent of the rest
//! of the project. Each client exposes the same narrow surface: search for
//! an artist's events and return them as [`RawConcert`] values, leaving
//! normalization and deduplication to the caller.

mod error;
mod models;
mod provider;
mod setlistfm;
mod spotify;
mod ticketmaster;

pub use error::{Error, Result};
pub use models::{RawConcert, Service};
pub use provider::Provider;
pub use setlistfm::SetlistFmClient;
pub use spotify::SpotifyClient;
pub use ticketmaster::TicketmasterClient;
