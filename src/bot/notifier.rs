use crate::db::entities::concerts;
use anyhow::{Context, Result};
use std::future::Future;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::markdown;
use tracing::info;

/// Narrow delivery seam: one text message to one chat. The scheduler only
/// ever talks to this, which keeps delivery mockable.
pub trait Channel: Send + Sync {
    fn send(&self, chat_id: i64, text: String) -> impl Future<Output = Result<()>> + Send;
}

/// Telegram-backed channel.
#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl Channel for TelegramChannel {
    fn send(&self, chat_id: i64, text: String) -> impl Future<Output = Result<()>> + Send {
        let bot = self.bot.clone();
        async move {
            bot.send_message(ChatId(chat_id), text)
                .parse_mode(ParseMode::MarkdownV2)
                .await
                .context("Failed to send Telegram message")?;
            Ok(())
        }
    }
}

/// Delivers one message per pending (user, concert) pair.
///
/// On failure the caller must NOT record the notification, the pair stays
/// pending and is retried on the next cycle.
#[derive(Clone)]
pub struct Notifier<C: Channel> {
    channel: C,
}

impl<C: Channel> Notifier<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub async fn notify(&self, user_id: i64, concert: &concerts::Model) -> Result<()> {
        let text = format_concert(concert);
        self.channel.send(user_id, text).await?;
        info!(
            "✅ Notified user {} about concert {} ({} @ {})",
            user_id, concert.id, concert.artist, concert.city
        );
        Ok(())
    }
}

/// MarkdownV2 message for one concert.
pub fn format_concert(concert: &concerts::Model) -> String {
    let mut text = format!("🎸 *{}*\n", markdown::escape(&concert.title));

    let place = match (concert.venue.is_empty(), concert.city.is_empty()) {
        (false, false) => format!("{}, {}", concert.venue, concert.city),
        (false, true) => concert.venue.clone(),
        (true, false) => concert.city.clone(),
        (true, true) => String::new(),
    };
    if !place.is_empty() {
        text.push_str(&format!("📍 {}", markdown::escape(&place)));
        if !concert.country.is_empty() {
            text.push_str(&format!(" \\({}\\)", markdown::escape(&concert.country)));
        }
        text.push('\n');
    }

    text.push_str(&format!("📅 {}", markdown::escape(&concert.date)));
    if !concert.time.is_empty() {
        text.push_str(&format!(" {}", markdown::escape(&concert.time)));
    }

    if !concert.url.is_empty() {
        text.push_str(&format!(
            "\n🔗 [tickets / info]({})",
            markdown::escape_link_url(&concert.url)
        ));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn concert(venue: &str, time: &str, url: &str) -> concerts::Model {
        concerts::Model {
            id: 1,
            artist_id: 1,
            identity_hash: "abc".to_string(),
            artist: "boards of canada".to_string(),
            title: "Boards of Canada - World Tour".to_string(),
            venue: venue.to_string(),
            city: "madrid".to_string(),
            country: "ES".to_string(),
            date: "2025-05-01".to_string(),
            time: time.to_string(),
            url: url.to_string(),
            service: "ticketmaster".to_string(),
            created_at: Local::now().naive_local(),
        }
    }

    #[test]
    fn formats_full_concert() {
        let text = format_concert(&concert("la riviera", "20:30", "https://tm.example/e/1"));
        assert!(text.contains("Boards of Canada"));
        assert!(text.contains("la riviera, madrid"));
        // MarkdownV2 wants the date dashes escaped
        assert!(text.contains("2025\\-05\\-01"));
        assert!(text.contains("20:30"));
        assert!(text.contains("https://tm.example/e/1"));
    }

    #[test]
    fn omits_missing_pieces() {
        let text = format_concert(&concert("", "", ""));
        assert!(!text.contains("📍 ,"));
        assert!(!text.contains("🔗"));
        assert!(text.contains("madrid"));
    }
}
