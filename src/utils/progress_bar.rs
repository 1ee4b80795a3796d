use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::media::{PipelineEvent, PipelineState};

/// Chat message edited in place as a request moves through the pipeline.
#[derive(Clone)]
pub struct ProgressBar {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
    heading: String,
}

pub fn stage_progress(state: PipelineState) -> Option<(u8, &'static str)> {
    match state {
        PipelineState::Idle => None,
        PipelineState::Resolved => Some((10, "🔎 Link resolved")),
        PipelineState::Selected => Some((20, "🎯 Stream selected")),
        PipelineState::Fetching => Some((30, "⬇️ Downloading...")),
        PipelineState::Assembling => Some((70, "🛠 Processing...")),
        PipelineState::Delivering => Some((85, "📤 Uploading...")),
        PipelineState::Done | PipelineState::Failed => None,
    }
}

/// Percentage steps below which download updates are not sent, to stay under
/// Telegram's edit rate limit.
const DOWNLOAD_STEP: u8 = 5;
const FETCH_START: f64 = 30.0;
const FETCH_SPAN: f64 = 40.0;

/// Overall percentage while stream `index` of `count` is `percent` downloaded.
/// Stays inside the Fetching band, between the Fetching and Assembling stages.
pub fn fetch_progress(index: usize, count: usize, percent: f64) -> u8 {
    let count = count.max(1) as f64;
    let done = (index as f64 + percent.clamp(0.0, 100.0) / 100.0) / count;
    (FETCH_START + FETCH_SPAN * done.min(1.0)).floor() as u8
}

pub fn render(heading: &str, percentage: u8, extra_info: Option<&str>) -> String {
    let bar_length = 20;
    let filled_length = (percentage.min(100) as f32 / 100.0 * bar_length as f32) as usize;
    let bar: String = (0..bar_length)
        .map(|i| if i < filled_length { '█' } else { '░' })
        .collect();
    let mut result = format!("{}\n[{}] {}%", heading, bar, percentage);
    if let Some(info) = extra_info {
        result.push_str(&format!("\n{}", info));
    }
    result
}

impl ProgressBar {
    pub fn attach(bot: Bot, chat_id: ChatId, message_id: MessageId, heading: String) -> Self {
        Self {
            bot,
            chat_id,
            message_id,
            heading,
        }
    }

    pub async fn update(&self, percentage: u8, extra_info: Option<&str>) {
        let text = render(&self.heading, percentage, extra_info);
        if let Err(e) = self.bot.edit_message_text(self.chat_id, self.message_id, text).await {
            if !e.to_string().contains("message is not modified") {
                log::warn!("Failed to update progress message: {}", e);
            }
        }
    }

    /// Mirrors pipeline events into the message until the sender is dropped.
    pub async fn follow(&self, mut events: UnboundedReceiver<PipelineEvent>) {
        let mut shown = 0u8;
        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::Stage(state) => {
                    if let Some((percentage, info)) = stage_progress(state) {
                        shown = percentage;
                        self.update(percentage, Some(info)).await;
                    }
                }
                PipelineEvent::Fetched { index, count, percent } => {
                    let percentage = fetch_progress(index, count, percent);
                    if percentage >= shown.saturating_add(DOWNLOAD_STEP) {
                        shown = percentage;
                        let info = format!("⬇️ Downloading {}/{}... {:.0}%", index + 1, count, percent);
                        self.update(percentage, Some(&info)).await;
                    }
                }
            }
        }
    }

    /// Replaces the bar with a final outcome line.
    pub async fn finish(&self, text: &str) {
        if let Err(e) = self.bot.edit_message_text(self.chat_id, self.message_id, text).await {
            log::warn!("Failed to write final status, sending instead: {}", e);
            if let Err(e) = self.bot.send_message(self.chat_id, text).await {
                log::error!("Failed to report outcome to chat {}: {}", self.chat_id.0, e);
            }
        }
    }
}
