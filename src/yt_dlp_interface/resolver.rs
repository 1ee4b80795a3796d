use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::PipelineError;
use crate::media::{MediaResolver, MediaSource, ResolvedMedia, StreamDescriptor, StreamKind};
use crate::yt_dlp_interface::YtDlpClient;
use crate::yt_dlp_interface::utils::last_error_line;

#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    formats: Vec<FormatJson>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    fps: Option<f64>,
    #[serde(default)]
    abr: Option<f64>,
    #[serde(default)]
    tbr: Option<f64>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    filesize_approx: Option<f64>,
}

impl FormatJson {
    fn kind(&self) -> Option<StreamKind> {
        // Missing codec fields mean "unknown". A bare file with a height is
        // treated as carrying both tracks.
        let video = match self.vcodec.as_deref() {
            Some("none") => false,
            Some(_) => true,
            None => self.height.is_some(),
        };
        let audio = match self.acodec.as_deref() {
            Some("none") => false,
            Some(_) => true,
            None => self.vcodec.is_none() && self.height.is_some(),
        };
        match (video, audio) {
            (true, true) => Some(StreamKind::Progressive),
            (true, false) => Some(StreamKind::Video),
            (false, true) => Some(StreamKind::Audio),
            (false, false) => None,
        }
    }

    /// Shorter frame side, as yt-dlp reports resolution. Portrait streams
    /// would otherwise never match their tier.
    fn resolution(&self) -> Option<u32> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(width.min(height)),
            (_, height) => height,
        }
    }

    fn into_descriptor(self) -> Option<StreamDescriptor> {
        if self.ext.as_deref() == Some("mhtml") {
            return None;
        }
        let kind = self.kind()?;
        let bitrate_kbps = match kind {
            StreamKind::Audio => self.abr.or(self.tbr),
            _ => self.tbr,
        };
        let height = self.resolution();
        Some(StreamDescriptor {
            format_id: self.format_id,
            kind,
            height,
            fps: self.fps,
            bitrate_kbps,
            container: self.ext.unwrap_or_else(|| "bin".to_string()),
            size_bytes: self.filesize.or(self.filesize_approx.map(|size| size as u64)),
        })
    }
}

/// Parses the output of `yt-dlp --dump-single-json`.
pub fn parse_info(json: &[u8], requested_url: &str) -> Result<ResolvedMedia, PipelineError> {
    let info: InfoJson = serde_json::from_slice(json)
        .map_err(|e| PipelineError::Resolution(format!("malformed metadata: {}", e)))?;

    let streams: Vec<StreamDescriptor> = info
        .formats
        .into_iter()
        .filter_map(FormatJson::into_descriptor)
        .collect();

    Ok(ResolvedMedia {
        source: MediaSource {
            url: info.webpage_url.unwrap_or_else(|| requested_url.to_string()),
            title: info.title.unwrap_or_else(|| "Untitled".to_string()),
        },
        streams,
    })
}

#[async_trait]
impl MediaResolver for YtDlpClient {
    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, PipelineError> {
        log::info!("Resolving {}", url);
        let output = Command::new(&self.yt_dlp_path)
            .arg("--dump-single-json")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg(url)
            .output()
            .await
            .map_err(|e| PipelineError::Resolution(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("yt-dlp could not resolve {}: {}", url, stderr.trim());
            return Err(PipelineError::Resolution(last_error_line(&stderr)));
        }

        parse_info(&output.stdout, url)
    }
}
