use crate::bot::Command;
use crate::db::repo::Repo;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info};

#[derive(Clone)]
pub struct BotHandler {
    repo: Arc<Repo>,
}

impl BotHandler {
    pub fn new(repo: Arc<Repo>) -> Self {
        Self { repo }
    }

    pub async fn handle_command(&self, bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
        let chat_id = msg.chat.id;
        let username = msg.from.as_ref().and_then(|u| u.username.clone());

        info!("Received command from chat {}: {:?}", chat_id, cmd);

        // Every interaction creates or refreshes the user row
        if let Err(e) = self.repo.upsert_user(chat_id.0, username).await {
            error!("Failed to upsert user {}: {:#}", chat_id, e);
            bot.send_message(chat_id, "⚠️ Database error occurred").await?;
            return Ok(());
        }

        match cmd {
            Command::Help => self.handle_help(bot, chat_id).await,
            Command::Start => self.handle_start(bot, chat_id).await,
            Command::Follow(args) => self.handle_follow(bot, chat_id, args).await,
            Command::Unfollow(args) => self.handle_unfollow(bot, chat_id, args).await,
            Command::List => self.handle_list(bot, chat_id).await,
            Command::Mute(args) => self.handle_mute(bot, chat_id, args, false).await,
            Command::Unmute(args) => self.handle_mute(bot, chat_id, args, true).await,
            Command::Country(args) => self.handle_country(bot, chat_id, args).await,
            Command::Services(args) => self.handle_services(bot, chat_id, args).await,
            Command::Notifications(args) => self.handle_notifications(bot, chat_id, args).await,
        }
    }

    async fn handle_help(&self, bot: Bot, chat_id: ChatId) -> ResponseResult<()> {
        use teloxide::utils::command::BotCommands;
        bot.send_message(chat_id, Command::descriptions().to_string())
            .await?;
        Ok(())
    }

    async fn handle_start(&self, bot: Bot, chat_id: ChatId) -> ResponseResult<()> {
        bot.send_message(
            chat_id,
            "🎶 Follow artists with /follow and I'll message you when a new \
             concert of theirs shows up on Ticketmaster, Spotify or Setlist.fm.\n\
             Searches run once a day. /help lists all commands.",
        )
        .await?;
        Ok(())
    }

    async fn handle_follow(&self, bot: Bot, chat_id: ChatId, args: String) -> ResponseResult<()> {
        let name = args.trim();
        if name.is_empty() {
            bot.send_message(chat_id, "❌ Usage: /follow <artist name>")
                .await?;
            return Ok(());
        }

        match self.repo.follow(chat_id.0, name).await {
            Ok(artist) => {
                bot.send_message(
                    chat_id,
                    format!("✅ Following {}", artist.display_name),
                )
                .await?;
            }
            Err(e) => {
                error!("Failed to follow {} for {}: {:#}", name, chat_id, e);
                bot.send_message(chat_id, "⚠️ Could not save that, try again later")
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_unfollow(&self, bot: Bot, chat_id: ChatId, args: String) -> ResponseResult<()> {
        let name = args.trim();
        if name.is_empty() {
            bot.send_message(chat_id, "❌ Usage: /unfollow <artist name>")
                .await?;
            return Ok(());
        }

        match self.repo.unfollow(chat_id.0, name).await {
            Ok(true) => {
                bot.send_message(chat_id, format!("✅ Unfollowed {}", name))
                    .await?;
            }
            Ok(false) => {
                bot.send_message(chat_id, format!("You were not following {}", name))
                    .await?;
            }
            Err(e) => {
                error!("Failed to unfollow {} for {}: {:#}", name, chat_id, e);
                bot.send_message(chat_id, "⚠️ Could not save that, try again later")
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_list(&self, bot: Bot, chat_id: ChatId) -> ResponseResult<()> {
        match self.repo.followed_artists(chat_id.0).await {
            Ok(artists) if artists.is_empty() => {
                bot.send_message(chat_id, "You are not following anyone yet, try /follow")
                    .await?;
            }
            Ok(artists) => {
                let mut response = String::from("🎧 Followed artists:\n");
                for artist in artists {
                    response.push_str(&format!("  • {}\n", artist.display_name));
                }
                bot.send_message(chat_id, response).await?;
            }
            Err(e) => {
                error!("Failed to list artists for {}: {:#}", chat_id, e);
                bot.send_message(chat_id, "⚠️ Could not read your subscriptions")
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_mute(
        &self,
        bot: Bot,
        chat_id: ChatId,
        args: String,
        enabled: bool,
    ) -> ResponseResult<()> {
        let name = args.trim();
        if name.is_empty() {
            let verb = if enabled { "unmute" } else { "mute" };
            bot.send_message(chat_id, format!("❌ Usage: /{} <artist name>", verb))
                .await?;
            return Ok(());
        }

        match self.repo.set_artist_notify(chat_id.0, name, enabled).await {
            Ok(true) => {
                let state = if enabled { "🔔 unmuted" } else { "🔕 muted" };
                bot.send_message(chat_id, format!("✅ {} {}", state, name))
                    .await?;
            }
            Ok(false) => {
                bot.send_message(chat_id, format!("You are not following {}", name))
                    .await?;
            }
            Err(e) => {
                error!("Failed to toggle {} for {}: {:#}", name, chat_id, e);
                bot.send_message(chat_id, "⚠️ Could not save that, try again later")
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_country(&self, bot: Bot, chat_id: ChatId, args: String) -> ResponseResult<()> {
        let arg = args.trim();

        let country = match arg.to_lowercase().as_str() {
            "" => {
                bot.send_message(chat_id, "❌ Usage: /country <ISO code>, e.g. /country ES, or /country clear")
                    .await?;
                return Ok(());
            }
            "clear" | "off" | "all" => None,
            _ if arg.len() == 2 && arg.chars().all(|c| c.is_ascii_alphabetic()) => {
                Some(arg.to_string())
            }
            _ => {
                bot.send_message(chat_id, "❌ Country must be a two-letter ISO code")
                    .await?;
                return Ok(());
            }
        };

        match self.repo.set_country(chat_id.0, country.clone()).await {
            Ok(_) => {
                let reply = match country {
                    Some(cc) => format!("✅ Only concerts in {} from now on", cc.to_uppercase()),
                    None => "✅ Country filter cleared, concerts everywhere".to_string(),
                };
                bot.send_message(chat_id, reply).await?;
            }
            Err(e) => {
                error!("Failed to set country for {}: {:#}", chat_id, e);
                bot.send_message(chat_id, "⚠️ Could not save that, try again later")
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_services(&self, bot: Bot, chat_id: ChatId, args: String) -> ResponseResult<()> {
        let parts: Vec<&str> = args.split_whitespace().collect();

        // Bare /services shows the current flags
        if parts.is_empty() {
            match self.repo.get_user(chat_id.0).await {
                Ok(Some(user)) => {
                    let mut response = String::from("🔍 Search services:\n");
                    for service in concert_client::Service::all() {
                        let state = if user.service_enabled(service) { "on" } else { "off" };
                        response.push_str(&format!("  • {}: {}\n", service, state));
                    }
                    bot.send_message(chat_id, response).await?;
                }
                Ok(None) => {
                    bot.send_message(chat_id, "Send /start first").await?;
                }
                Err(e) => {
                    error!("Failed to read user {}: {:#}", chat_id, e);
                    bot.send_message(chat_id, "⚠️ Could not read your settings")
                        .await?;
                }
            }
            return Ok(());
        }

        let (service, enabled) = match parts.as_slice() {
            [service, state] => {
                let Ok(service) = service.parse::<concert_client::Service>() else {
                    bot.send_message(chat_id, "❌ Unknown service, use tm, spotify or setlistfm")
                        .await?;
                    return Ok(());
                };
                let Some(enabled) = parse_on_off(state) else {
                    bot.send_message(chat_id, "❌ Usage: /services <tm|spotify|setlistfm> <on|off>")
                        .await?;
                    return Ok(());
                };
                (service, enabled)
            }
            _ => {
                bot.send_message(chat_id, "❌ Usage: /services <tm|spotify|setlistfm> <on|off>")
                    .await?;
                return Ok(());
            }
        };

        match self
            .repo
            .set_service_enabled(chat_id.0, service, enabled)
            .await
        {
            Ok(_) => {
                let state = if enabled { "on" } else { "off" };
                bot.send_message(chat_id, format!("✅ {} is now {}", service, state))
                    .await?;
            }
            Err(e) => {
                error!("Failed to set service flag for {}: {:#}", chat_id, e);
                bot.send_message(chat_id, "⚠️ Could not save that, try again later")
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_notifications(
        &self,
        bot: Bot,
        chat_id: ChatId,
        args: String,
    ) -> ResponseResult<()> {
        let Some(enabled) = parse_on_off(args.trim()) else {
            bot.send_message(chat_id, "❌ Usage: /notifications <on|off>")
                .await?;
            return Ok(());
        };

        match self.repo.set_notifications_enabled(chat_id.0, enabled).await {
            Ok(_) => {
                let reply = if enabled {
                    "🔔 Notifications on"
                } else {
                    "🔕 Notifications off, your follows are kept"
                };
                bot.send_message(chat_id, reply).await?;
            }
            Err(e) => {
                error!("Failed to toggle notifications for {}: {:#}", chat_id, e);
                bot.send_message(chat_id, "⚠️ Could not save that, try again later")
                    .await?;
            }
        }
        Ok(())
    }
}

fn parse_on_off(arg: &str) -> Option<bool> {
    match arg.to_lowercase().as_str() {
        "on" | "yes" | "true" => Some(true),
        "off" | "no" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_off_parsing() {
        assert_eq!(parse_on_off("on"), Some(true));
        assert_eq!(parse_on_off("OFF"), Some(false));
        assert_eq!(parse_on_off("maybe"), None);
        assert_eq!(parse_on_off(""), None);
    }
}
