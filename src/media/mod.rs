pub mod assembler;
pub mod job;
pub mod pipeline;
pub mod selector;
pub mod transcoder;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::error::PipelineError;

pub use pipeline::{Pipeline, PipelineEvent, PipelineState};
pub use transcoder::{OutputSpec, Transcoder};

/// A remote item as advertised by the resolver backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Video elementary stream without audio.
    Video,
    /// Audio elementary stream without video.
    Audio,
    /// One file carrying both audio and video.
    Progressive,
}

/// One retrievable stream. Produced by a [`MediaResolver`], never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    /// Backend-specific identifier used to fetch this exact stream.
    pub format_id: String,
    pub kind: StreamKind,
    /// Resolution in the tier sense: the shorter frame side, so a 360x640
    /// portrait clip counts as 360p.
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub bitrate_kbps: Option<f64>,
    /// Container extension, e.g. `mp4`, `webm`, `m4a`.
    pub container: String,
    pub size_bytes: Option<u64>,
}

/// Everything a resolver learned about a URL without downloading it.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub source: MediaSource,
    pub streams: Vec<StreamDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityTier {
    Audio,
    P360,
    P720,
    P1080,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Audio,
        QualityTier::P360,
        QualityTier::P720,
        QualityTier::P1080,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QualityTier::Audio => "audio",
            QualityTier::P360 => "360p",
            QualityTier::P720 => "720p",
            QualityTier::P1080 => "1080p",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.label() == label)
    }

    /// Target frame height, `None` for the audio tier.
    pub fn height(self) -> Option<u32> {
        match self {
            QualityTier::Audio => None,
            QualityTier::P360 => Some(360),
            QualityTier::P720 => Some(720),
            QualityTier::P1080 => Some(1080),
        }
    }

    pub fn delivery_kind(self) -> DeliveryKind {
        match self {
            QualityTier::Audio => DeliveryKind::Audio,
            _ => DeliveryKind::Video,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the chat transport should present an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Audio,
    Video,
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, PipelineError>;
}

#[async_trait]
pub trait StreamFetcher: Send + Sync {
    /// Writes exactly one file, at `dest`, holding the bytes of `stream`.
    /// `progress` receives the download percentage, 0 to 100, as it advances.
    async fn fetch(
        &self,
        source: &MediaSource,
        stream: &StreamDescriptor,
        dest: &Path,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), PipelineError>;
}

#[async_trait]
pub trait MediaDelivery: Send + Sync {
    async fn send(&self, path: &Path, kind: DeliveryKind, caption: &str) -> Result<(), PipelineError>;
}
