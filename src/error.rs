use thiserror::Error;

use crate::media::QualityTier;

/// Terminal failures of a single media request. None of them is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not resolve the link: {0}")]
    Resolution(String),

    #[error("no {tier} stream available: {reason}")]
    StreamUnavailable { tier: QualityTier, reason: String },

    #[error("download failed: {0}")]
    Fetch(String),

    #[error("processing failed: {0}")]
    Assembly(String),

    #[error("upload failed: {0}")]
    Delivery(String),
}

impl PipelineError {
    pub fn unavailable(tier: QualityTier, reason: impl Into<String>) -> Self {
        PipelineError::StreamUnavailable {
            tier,
            reason: reason.into(),
        }
    }

    /// Text shown to the chat user when the request fails.
    pub fn user_message(&self) -> String {
        let icon = match self {
            PipelineError::StreamUnavailable { .. } => "🚫",
            _ => "❌",
        };
        format!("{} {}", icon, capitalize(&self.to_string()))
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
