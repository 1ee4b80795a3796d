use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use teloxide::types::ChatId;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::error::PipelineError;
use crate::media::{DeliveryKind, MediaDelivery};

/// Largest file the public Bot API accepts for upload.
pub const TELEGRAM_BOT_API_FILE_LIMIT: u64 = 50 * 1024 * 1024;
const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const CAPTION_LIMIT: usize = 1024;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Uploads finished media to one chat through `sendVideo` / `sendAudio`.
pub struct BotApiDelivery {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
    chat_id: ChatId,
}

impl BotApiDelivery {
    pub fn new(client: reqwest::Client, bot_token: &str, chat_id: ChatId) -> Self {
        Self {
            client,
            api_url: TELEGRAM_API_URL.to_string(),
            bot_token: bot_token.to_string(),
            chat_id,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }
}

pub fn mime_for(path: &Path, kind: DeliveryKind) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();
    match (kind, ext.as_str()) {
        (DeliveryKind::Audio, "m4a") => "audio/mp4",
        (DeliveryKind::Audio, "aac") => "audio/aac",
        (DeliveryKind::Audio, "ogg" | "opus") => "audio/ogg",
        (DeliveryKind::Audio, _) => "audio/mpeg",
        (DeliveryKind::Video, "webm") => "video/webm",
        (DeliveryKind::Video, "mkv") => "video/x-matroska",
        (DeliveryKind::Video, _) => "video/mp4",
    }
}

fn truncate_caption(caption: &str) -> String {
    caption.chars().take(CAPTION_LIMIT).collect()
}

#[async_trait]
impl MediaDelivery for BotApiDelivery {
    async fn send(&self, path: &Path, kind: DeliveryKind, caption: &str) -> Result<(), PipelineError> {
        let file = File::open(path)
            .await
            .map_err(|e| PipelineError::Delivery(format!("cannot open {}: {}", path.display(), e)))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| PipelineError::Delivery(e.to_string()))?
            .len();
        if len > TELEGRAM_BOT_API_FILE_LIMIT {
            return Err(PipelineError::Delivery(format!(
                "file is {:.1} MB, above the {} MB upload limit",
                len as f64 / 1_048_576.0,
                TELEGRAM_BOT_API_FILE_LIMIT / 1_048_576
            )));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(file_name)
            .mime_str(mime_for(path, kind))
            .map_err(|e| PipelineError::Delivery(e.to_string()))?;

        let (method, field) = match kind {
            DeliveryKind::Video => ("sendVideo", "video"),
            DeliveryKind::Audio => ("sendAudio", "audio"),
        };
        let mut form = Form::new()
            .text("chat_id", self.chat_id.0.to_string())
            .text("caption", truncate_caption(caption))
            .part(field, part);
        if kind == DeliveryKind::Video {
            form = form.text("supports_streaming", "true");
        }

        log::info!("Uploading {} ({} bytes) to chat {} via {}", path.display(), len, self.chat_id.0, method);
        let resp = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Delivery(e.without_url().to_string()))?;

        let status = resp.status();
        let body: Option<ApiResponse> = resp.json().await.ok();
        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse { description, .. }) => Err(PipelineError::Delivery(format!(
                "Bot API {} failed ({}): {}",
                method,
                status,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(PipelineError::Delivery(format!("Bot API {} failed: {}", method, status))),
        }
    }
}
