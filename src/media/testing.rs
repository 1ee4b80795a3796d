//! In-memory stand-ins for the external collaborators, used by the pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::media::{
    DeliveryKind, MediaDelivery, MediaResolver, MediaSource, OutputSpec, ResolvedMedia, StreamDescriptor,
    StreamFetcher, StreamKind, Transcoder,
};

pub fn progressive(id: &str, height: u32, container: &str) -> StreamDescriptor {
    StreamDescriptor {
        format_id: id.to_string(),
        kind: StreamKind::Progressive,
        height: Some(height),
        fps: Some(30.0),
        bitrate_kbps: None,
        container: container.to_string(),
        size_bytes: None,
    }
}

pub fn video(id: &str, height: u32, fps: f64, container: &str) -> StreamDescriptor {
    StreamDescriptor {
        format_id: id.to_string(),
        kind: StreamKind::Video,
        height: Some(height),
        fps: Some(fps),
        bitrate_kbps: None,
        container: container.to_string(),
        size_bytes: None,
    }
}

pub fn audio(id: &str, kbps: f64) -> StreamDescriptor {
    StreamDescriptor {
        format_id: id.to_string(),
        kind: StreamKind::Audio,
        height: None,
        fps: None,
        bitrate_kbps: Some(kbps),
        container: "m4a".to_string(),
        size_bytes: None,
    }
}

pub struct FakeResolver {
    outcome: Result<Vec<StreamDescriptor>, String>,
}

impl FakeResolver {
    pub fn with(streams: Vec<StreamDescriptor>) -> Self {
        Self { outcome: Ok(streams) }
    }

    pub fn failing(cause: &str) -> Self {
        Self {
            outcome: Err(cause.to_string()),
        }
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, PipelineError> {
        match &self.outcome {
            Ok(streams) => Ok(ResolvedMedia {
                source: MediaSource {
                    url: url.to_string(),
                    title: "Example clip".to_string(),
                },
                streams: streams.clone(),
            }),
            Err(cause) => Err(PipelineError::Resolution(cause.clone())),
        }
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    fail_on: Option<String>,
    write_nothing: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn failing_on(format_id: &str) -> Self {
        Self {
            fail_on: Some(format_id.to_string()),
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            write_nothing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _source: &MediaSource,
        stream: &StreamDescriptor,
        dest: &Path,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), PipelineError> {
        self.calls.lock().unwrap().push(stream.format_id.clone());
        if self.write_nothing {
            return Ok(());
        }
        // Partial output first, like an interrupted download would leave.
        std::fs::write(dest, b"partial").unwrap();
        if self.fail_on.as_deref() == Some(stream.format_id.as_str()) {
            return Err(PipelineError::Fetch("connection reset".to_string()));
        }
        std::fs::write(dest, stream.format_id.as_bytes()).unwrap();
        progress(100.0);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTranscoder {
    fail: bool,
    write_nothing: bool,
    calls: Mutex<Vec<OutputSpec>>,
}

impl FakeTranscoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Reports success without producing an output file.
    pub fn silent() -> Self {
        Self {
            write_nothing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<OutputSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, inputs: &[&Path], spec: OutputSpec, output: &Path) -> Result<(), PipelineError> {
        self.calls.lock().unwrap().push(spec);
        assert_eq!(inputs.len(), spec.input_count());
        assert!(inputs.iter().all(|input| input.exists()));
        if self.write_nothing {
            return Ok(());
        }
        std::fs::write(output, b"half-written").unwrap();
        if self.fail {
            return Err(PipelineError::Assembly("ffmpeg exited with status 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentFile {
    pub path: PathBuf,
    pub kind: DeliveryKind,
    pub existed_during_send: bool,
    /// Other entries sharing the artifact's directory at upload time.
    pub siblings_during_send: usize,
}

#[derive(Default)]
pub struct FakeDelivery {
    fail: bool,
    sent: Mutex<Vec<SentFile>>,
}

impl FakeDelivery {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentFile> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaDelivery for FakeDelivery {
    async fn send(&self, path: &Path, kind: DeliveryKind, _caption: &str) -> Result<(), PipelineError> {
        let siblings = path
            .parent()
            .and_then(|dir| std::fs::read_dir(dir).ok())
            .map(|entries| entries.filter_map(Result::ok).filter(|e| e.path() != path).count())
            .unwrap_or(0);
        self.sent.lock().unwrap().push(SentFile {
            path: path.to_path_buf(),
            kind,
            existed_during_send: path.exists(),
            siblings_during_send: siblings,
        });
        if self.fail {
            return Err(PipelineError::Delivery("Bad Request: chat not found".to_string()));
        }
        Ok(())
    }
}
