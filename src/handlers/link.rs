use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::handlers::callback::CallbackAction;
use crate::media::QualityTier;
use crate::session::SessionStore;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>]+").expect("valid URL regex"));

/// First http(s) link in a message, if any.
pub fn extract_url(text: &str) -> Option<String> {
    URL_PATTERN
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')', '!', '?']).to_string())
}

pub fn tier_keyboard() -> InlineKeyboardMarkup {
    let button = |tier: QualityTier| {
        let label = match tier {
            QualityTier::Audio => "🎵 audio".to_string(),
            _ => format!("🎬 {}", tier),
        };
        InlineKeyboardButton::callback(label, CallbackAction::Tier(tier).to_data())
    };
    InlineKeyboardMarkup::new(
        QualityTier::ALL
            .chunks(2)
            .map(|row| row.iter().copied().map(button).collect::<Vec<_>>()),
    )
}

pub async fn link_handler(bot: Bot, msg: Message, sessions: Arc<SessionStore>) -> Result<(), anyhow::Error> {
    let text = match msg.text() {
        Some(text) => text,
        None => return Ok(()),
    };

    let Some(url) = extract_url(text) else {
        bot.send_message(msg.chat.id, "Please send a video link, or search a movie with /movie <title>.")
            .await?;
        return Ok(());
    };

    log::info!("Chat {} sent link {}", msg.chat.id.0, url);
    sessions.remember_media_url(msg.chat.id.0, url).await;
    log::debug!("{} chats with a live session", sessions.len().await);
    bot.send_message(msg.chat.id, "Please choose your desired format:")
        .reply_markup(tier_keyboard())
        .await?;

    Ok(())
}
