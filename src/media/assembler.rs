use crate::error::PipelineError;
use crate::media::job::{AssembledArtifact, DownloadJob, TempFile};
use crate::media::{DeliveryKind, OutputSpec, StreamKind, Transcoder};

/// Turns the fetched files of `job` into one deliverable.
///
/// Sources are moved out of the job. They are removed once the transcode
/// succeeds, and on failure together with any partial output.
pub async fn assemble(job: &mut DownloadJob, transcoder: &dyn Transcoder) -> Result<AssembledArtifact, PipelineError> {
    let mut files = std::mem::take(&mut job.files);

    let kinds: Vec<StreamKind> = files.iter().map(|(stream, _)| stream.kind).collect();

    let spec = match kinds.as_slice() {
        [StreamKind::Progressive] => {
            let (_, file) = files.remove(0);
            log::info!("Job {}: progressive stream passes through unchanged", job.id);
            return Ok(AssembledArtifact {
                file,
                kind: job.tier.delivery_kind(),
            });
        }
        [StreamKind::Audio] => OutputSpec::Mp3Audio,
        [StreamKind::Video, StreamKind::Audio] => OutputSpec::Mp4Mux,
        other => {
            return Err(PipelineError::Assembly(format!("cannot assemble streams {:?}", other)));
        }
    };

    let output = TempFile::new(job.next_path(spec.extension()));
    let inputs: Vec<_> = files.iter().map(|(_, file)| file.path()).collect();
    log::info!("Job {}: assembling {:?} into {}", job.id, spec, output.path().display());

    transcoder.transcode(&inputs, spec, output.path()).await?;
    if !output.path().exists() {
        return Err(PipelineError::Assembly(format!(
            "{:?} reported success but wrote no output",
            spec
        )));
    }

    drop(inputs);
    drop(files);
    let kind = match spec {
        OutputSpec::Mp3Audio => DeliveryKind::Audio,
        OutputSpec::Mp4Mux => DeliveryKind::Video,
    };
    Ok(AssembledArtifact { file: output, kind })
}
