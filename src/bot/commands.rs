use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "show this help")]
    Help,
    #[command(description = "register and show a short intro")]
    Start,
    #[command(description = "follow an artist\n  usage: /follow <name>")]
    Follow(String),
    #[command(description = "unfollow an artist\n  usage: /unfollow <name>")]
    Unfollow(String),
    #[command(description = "list followed artists")]
    List,
    #[command(description = "mute alerts for one artist\n  usage: /mute <name>")]
    Mute(String),
    #[command(description = "unmute alerts for one artist\n  usage: /unmute <name>")]
    Unmute(String),
    #[command(description = "set the country filter\n  usage: /country <code|clear>")]
    Country(String),
    #[command(description = "toggle a search service\n  usage: /services <tm|spotify|setlistfm> <on|off>")]
    Services(String),
    #[command(description = "turn all alerts on or off\n  usage: /notifications <on|off>")]
    Notifications(String),
}
