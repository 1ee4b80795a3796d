use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::handlers::callback::CallbackAction;
use crate::movies::{MovieCatalog, MovieDetails, MovieHit};
use crate::session::SessionStore;

/// Telegram caps inline keyboards; longer result lists are cut.
const MAX_RESULTS: usize = 20;

pub fn results_keyboard(hits: &[MovieHit]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(hits.iter().take(MAX_RESULTS).map(|hit| {
        vec![InlineKeyboardButton::callback(
            hit.title.clone(),
            CallbackAction::Movie(hit.id.clone()).to_data(),
        )]
    }))
}

/// One URL button per download link. Links that are not absolute URLs are skipped.
pub fn links_keyboard(details: &MovieDetails) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(details.links.iter().filter_map(|link| {
        let url = Url::parse(&link.url).ok()?;
        let label = if link.label.is_empty() { "Download".to_string() } else { link.label.clone() };
        Some(vec![InlineKeyboardButton::url(label, url)])
    }))
}

pub fn details_text(details: &MovieDetails) -> String {
    let mut text = format!("🎬 {}", details.title);
    if let Some(poster) = &details.poster {
        text.push_str(&format!("\n🖼 {}", poster));
    }
    if details.links.is_empty() {
        text.push_str("\nNo download links found.");
    }
    text
}

pub async fn movie_search(
    bot: &Bot,
    chat_id: ChatId,
    query: &str,
    sessions: &SessionStore,
    catalog: &MovieCatalog,
) -> Result<(), anyhow::Error> {
    let hits = match catalog.search(query).await {
        Ok(hits) => hits,
        Err(e) => {
            log::error!("Movie search '{}' failed: {}", query, e);
            bot.send_message(chat_id, format!("❌ Search failed: {}", e)).await?;
            return Ok(());
        }
    };

    if hits.is_empty() {
        bot.send_message(chat_id, format!("No results for \"{}\".", query)).await?;
        return Ok(());
    }

    sessions.remember_movies(chat_id.0, &hits).await;
    bot.send_message(chat_id, format!("Results for \"{}\":", query))
        .reply_markup(results_keyboard(&hits))
        .await?;
    Ok(())
}

pub async fn send_movie_details(
    bot: &Bot,
    chat_id: ChatId,
    movie_id: &str,
    sessions: &SessionStore,
    catalog: &MovieCatalog,
) -> Result<(), anyhow::Error> {
    let Some(page_url) = sessions.movie_url(chat_id.0, movie_id).await else {
        bot.send_message(chat_id, "⌛ These results have expired. Please search again with /movie <title>.")
            .await?;
        return Ok(());
    };

    match catalog.details(&page_url).await {
        Ok(details) => {
            bot.send_message(chat_id, details_text(&details))
                .reply_markup(links_keyboard(&details))
                .await?;
        }
        Err(e) => {
            log::error!("Fetching movie page {} failed: {}", page_url, e);
            bot.send_message(chat_id, format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}
