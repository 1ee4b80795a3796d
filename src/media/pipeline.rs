use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::PipelineError;
use crate::media::assembler::assemble;
use crate::media::job::{AssembledArtifact, DownloadJob, TempFile};
use crate::media::selector::select;
use crate::media::{MediaDelivery, MediaResolver, MediaSource, QualityTier, StreamFetcher, Transcoder};

/// Per-request progress. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Idle,
    Resolved,
    Selected,
    Fetching,
    Assembling,
    Delivering,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Resolved => "resolved",
            PipelineState::Selected => "selected",
            PipelineState::Fetching => "fetching",
            PipelineState::Assembling => "assembling",
            PipelineState::Delivering => "delivering",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a request observer is told while the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipelineEvent {
    Stage(PipelineState),
    /// Download percentage of stream `index` out of `count` selected streams.
    Fetched { index: usize, count: usize, percent: f64 },
}

struct StateTracker {
    request: String,
    state: PipelineState,
    observer: Option<UnboundedSender<PipelineEvent>>,
}

impl StateTracker {
    fn advance(&mut self, next: PipelineState) {
        debug_assert!(next > self.state, "{} -> {} goes backwards", self.state, next);
        log::info!("Request {}: {} -> {}", self.request, self.state, next);
        self.state = next;
        self.notify(PipelineEvent::Stage(next));
    }

    fn notify(&self, event: PipelineEvent) {
        if let Some(observer) = &self.observer {
            // The observer may have gone away; the request carries on regardless.
            let _ = observer.send(event);
        }
    }

    fn fetch_reporter(&self, index: usize, count: usize) -> impl Fn(f64) + Send + Sync + 'static {
        let observer = self.observer.clone();
        move |percent| {
            if let Some(observer) = &observer {
                let _ = observer.send(PipelineEvent::Fetched { index, count, percent });
            }
        }
    }
}

/// Resolve, select, fetch, assemble and deliver one user request.
///
/// Every step runs once, in order, with no retries and no timeout. Each call
/// works in its own job directory under `work_dir`, so concurrent requests
/// share nothing but the filesystem namespace.
pub struct Pipeline {
    resolver: Arc<dyn MediaResolver>,
    fetcher: Arc<dyn StreamFetcher>,
    transcoder: Arc<dyn Transcoder>,
    work_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        fetcher: Arc<dyn StreamFetcher>,
        transcoder: Arc<dyn Transcoder>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            transcoder,
            work_dir,
        }
    }

    pub async fn run(
        &self,
        url: &str,
        tier: QualityTier,
        delivery: &dyn MediaDelivery,
        observer: Option<UnboundedSender<PipelineEvent>>,
    ) -> Result<MediaSource, PipelineError> {
        let mut tracker = StateTracker {
            request: format!("{} [{}]", url, tier),
            state: PipelineState::Idle,
            observer,
        };

        match self.execute(url, tier, delivery, &mut tracker).await {
            Ok(source) => {
                tracker.advance(PipelineState::Done);
                Ok(source)
            }
            Err(e) => {
                log::error!("Request {} failed: {}", tracker.request, e);
                tracker.advance(PipelineState::Failed);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        url: &str,
        tier: QualityTier,
        delivery: &dyn MediaDelivery,
        tracker: &mut StateTracker,
    ) -> Result<MediaSource, PipelineError> {
        let resolved = self.resolver.resolve(url).await?;
        log::info!(
            "Resolved '{}' with {} streams",
            resolved.source.title,
            resolved.streams.len()
        );
        tracker.advance(PipelineState::Resolved);

        let selection = select(&resolved.streams, tier)?;
        tracker.advance(PipelineState::Selected);

        let mut job = DownloadJob::create(&self.work_dir, tier)
            .map_err(|e| PipelineError::Fetch(format!("cannot create job directory: {}", e)))?;
        log::debug!("Job {} working in {}", job.id, job.dir().display());
        tracker.advance(PipelineState::Fetching);

        let streams = selection.streams();
        let count = streams.len();
        for (index, stream) in streams.into_iter().enumerate() {
            // Guard the path before the fetch starts so partial output is removed too.
            let file = TempFile::new(job.next_path(&stream.container));
            log::info!(
                "Job {} [{}]: fetching format {} ({:?}, {})",
                job.id,
                job.tier,
                stream.format_id,
                stream.kind,
                stream
                    .size_bytes
                    .map_or("size unknown".to_string(), |b| format!("{:.1} MB", b as f64 / 1_048_576.0))
            );
            let report = tracker.fetch_reporter(index, count);
            self.fetcher.fetch(&resolved.source, stream, file.path(), &report).await?;
            if !file.path().exists() {
                return Err(PipelineError::Fetch(format!(
                    "format {} produced no file",
                    stream.format_id
                )));
            }
            job.files.push((stream.clone(), file));
        }

        tracker.advance(PipelineState::Assembling);
        let artifact = assemble(&mut job, self.transcoder.as_ref()).await?;

        tracker.advance(PipelineState::Delivering);
        deliver(artifact, &resolved.source.title, delivery).await?;

        Ok(resolved.source)
    }
}

/// Hands the artifact to the transport. The file is removed when this returns,
/// whatever the outcome, and also if the transport panics.
pub async fn deliver(
    artifact: AssembledArtifact,
    caption: &str,
    delivery: &dyn MediaDelivery,
) -> Result<(), PipelineError> {
    delivery.send(artifact.path(), artifact.kind, caption).await
}
