use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, MessageId};
use tokio::sync::mpsc;

use crate::handlers::movie::send_movie_details;
use crate::media::{Pipeline, QualityTier};
use crate::movies::MovieCatalog;
use crate::session::SessionStore;
use crate::telegram_bot_api_uploader::BotApiDelivery;
use crate::utils::progress_bar::ProgressBar;

const TIER_PREFIX: &str = "tier:";
const MOVIE_PREFIX: &str = "movie:";

/// Decoded inline-button payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction {
    Tier(QualityTier),
    Movie(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(label) = data.strip_prefix(TIER_PREFIX) {
            return QualityTier::from_label(label).map(CallbackAction::Tier);
        }
        data.strip_prefix(MOVIE_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|id| CallbackAction::Movie(id.to_string()))
    }

    pub fn to_data(&self) -> String {
        match self {
            CallbackAction::Tier(tier) => format!("{}{}", TIER_PREFIX, tier.label()),
            CallbackAction::Movie(id) => format!("{}{}", MOVIE_PREFIX, id),
        }
    }
}

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    sessions: Arc<SessionStore>,
    pipeline: Arc<Pipeline>,
    catalog: Arc<MovieCatalog>,
    http: reqwest::Client,
) -> Result<(), anyhow::Error> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    log::info!("Received callback query with data: {}", data);

    let Some(message) = q.message.as_ref().and_then(|m| m.regular_message()) else {
        log::warn!("Callback {} refers to an inaccessible message", data);
        return Ok(());
    };

    match CallbackAction::parse(data) {
        Some(CallbackAction::Tier(tier)) => {
            start_media_request(bot, message.chat.id, message.id, tier, sessions, pipeline, http).await
        }
        Some(CallbackAction::Movie(id)) => send_movie_details(&bot, message.chat.id, &id, &sessions, &catalog).await,
        None => {
            log::warn!("Ignoring unknown callback data: {}", data);
            Ok(())
        }
    }
}

async fn start_media_request(
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
    tier: QualityTier,
    sessions: Arc<SessionStore>,
    pipeline: Arc<Pipeline>,
    http: reqwest::Client,
) -> Result<(), anyhow::Error> {
    let Some(url) = sessions.media_url(chat_id.0).await else {
        bot.edit_message_text(chat_id, message_id, "⌛ This request has expired. Please send the link again.")
            .await?;
        return Ok(());
    };

    let progress = ProgressBar::attach(bot.clone(), chat_id, message_id, format!("🎬 {} • {}", tier, url));
    progress.update(0, Some("🔎 Resolving link...")).await;
    let delivery = BotApiDelivery::new(http, bot.token(), chat_id);

    // Run detached so the dispatcher keeps serving other chats meanwhile.
    tokio::spawn(async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let follower = {
            let progress = progress.clone();
            tokio::spawn(async move { progress.follow(rx).await })
        };

        let outcome = pipeline.run(&url, tier, &delivery, Some(tx)).await;
        if let Err(e) = follower.await {
            log::warn!("Progress follower for chat {} ended abnormally: {}", chat_id.0, e);
        }

        match outcome {
            Ok(source) => progress.finish(&format!("✅ Done: {} ({})", source.title, tier)).await,
            Err(e) => progress.finish(&e.user_message()).await,
        }
    });

    Ok(())
}
