use std::path::Path;

use async_trait::async_trait;

use crate::error::PipelineError;

/// Audio codec used for every audio re-encode.
pub const AUDIO_CODEC: &str = "libmp3lame";
/// Codec the audio track of a muxed video is encoded to.
pub const MUX_AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "192k";

/// Output policy. Containers and codecs are fixed, never negotiated with the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSpec {
    /// Re-encode a single input into an MP3 file.
    Mp3Audio,
    /// Copy the video of input 0, encode the audio of input 1, into one MP4.
    Mp4Mux,
}

impl OutputSpec {
    pub fn extension(self) -> &'static str {
        match self {
            OutputSpec::Mp3Audio => "mp3",
            OutputSpec::Mp4Mux => "mp4",
        }
    }

    pub fn input_count(self) -> usize {
        match self {
            OutputSpec::Mp3Audio => 1,
            OutputSpec::Mp4Mux => 2,
        }
    }
}

/// Narrow seam around the external transcoding tool.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Writes `output` from `inputs` according to `spec`. Any failure maps to
    /// [`PipelineError::Assembly`]; cleaning up `output` is the caller's job.
    async fn transcode(&self, inputs: &[&Path], spec: OutputSpec, output: &Path) -> Result<(), PipelineError>;
}
