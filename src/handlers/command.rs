use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::commands::Command;
use crate::handlers::movie::movie_search;
use crate::movies::MovieCatalog;
use crate::session::SessionStore;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    sessions: Arc<SessionStore>,
    catalog: Arc<MovieCatalog>,
) -> Result<(), anyhow::Error> {
    match cmd {
        Command::Start => {
            bot.send_message(
                msg.chat.id,
                "Hello! Send me a video link and choose a format, or search a movie with /movie <title>.",
            )
            .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Movie(query) => {
            let query = query.trim();
            if query.is_empty() {
                bot.send_message(msg.chat.id, "Usage: /movie <title>").await?;
            } else {
                movie_search(&bot, msg.chat.id, query, &sessions, &catalog).await?;
            }
        }
    };
    Ok(())
}
