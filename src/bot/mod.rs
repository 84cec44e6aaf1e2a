pub mod commands;
mod handler;
pub mod notifier;

use crate::db::repo::Repo;
use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::info;

pub use commands::Command;
pub use handler::BotHandler;

/// Handler return type
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub async fn run(bot: Bot, repo: Arc<Repo>) -> Result<()> {
    info!("Starting Telegram Bot...");

    let handler = BotHandler::new(repo);

    // Make the command list visible in the Telegram UI
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!("Failed to set bot commands: {:#}", e);
    } else {
        info!("✅ Set bot commands");
    }

    let handler_tree = dptree::entry().branch(
        Update::filter_message()
            .filter_command::<Command>()
            .endpoint(handle_command),
    );

    Dispatcher::builder(bot, handler_tree)
        .dependencies(dptree::deps![handler])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    handler: BotHandler,
) -> HandlerResult {
    handler.handle_command(bot, msg, cmd).await?;
    Ok(())
}
