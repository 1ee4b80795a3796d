use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::PipelineError;
use crate::media::transcoder::{AUDIO_BITRATE, AUDIO_CODEC, MUX_AUDIO_CODEC};
use crate::media::{OutputSpec, Transcoder};
use crate::yt_dlp_interface::utils::last_error_line;

/// [`Transcoder`] backed by the `ffmpeg` executable.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    pub ffmpeg_path: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }
}

pub fn ffmpeg_args(inputs: &[&Path], spec: OutputSpec, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into(), "-y".into()];
    for input in inputs {
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());
    }
    match spec {
        OutputSpec::Mp3Audio => {
            args.extend(["-vn", "-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE].map(OsString::from));
        }
        OutputSpec::Mp4Mux => {
            args.extend(
                [
                    "-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", MUX_AUDIO_CODEC, "-b:a", AUDIO_BITRATE,
                    "-movflags", "+faststart",
                ]
                .map(OsString::from),
            );
        }
    }
    args.push(output.as_os_str().to_owned());
    args
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, inputs: &[&Path], spec: OutputSpec, output: &Path) -> Result<(), PipelineError> {
        if inputs.len() != spec.input_count() {
            return Err(PipelineError::Assembly(format!(
                "{:?} takes {} input(s), got {}",
                spec,
                spec.input_count(),
                inputs.len()
            )));
        }

        let args = ffmpeg_args(inputs, spec, output);
        log::debug!("Running {} {:?}", self.ffmpeg_path.display(), args);
        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .output()
            .await
            .map_err(|e| PipelineError::Assembly(format!("failed to run ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            log::error!("ffmpeg failed ({}): {}", result.status, stderr.trim());
            return Err(PipelineError::Assembly(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                last_error_line(&stderr)
            )));
        }
        Ok(())
    }
}
