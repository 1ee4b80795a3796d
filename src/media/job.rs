use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::media::{DeliveryKind, QualityTier, StreamDescriptor};

/// Prefix of every per-job directory created under the work dir.
pub const JOB_DIR_PREFIX: &str = "job-";

// RAII for automatic file cleanup
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed temp file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to cleanup temp file {}: {}", self.path.display(), e),
        }
    }
}

/// Files fetched for one request. Owned by exactly one pipeline invocation;
/// dropping it removes the job directory and everything left inside it.
pub struct DownloadJob {
    pub id: Uuid,
    pub tier: QualityTier,
    dir: tempfile::TempDir,
    pub files: Vec<(StreamDescriptor, TempFile)>,
}

impl DownloadJob {
    pub fn create(work_dir: &Path, tier: QualityTier) -> io::Result<Self> {
        let id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", JOB_DIR_PREFIX, id.simple()))
            .tempdir_in(work_dir)?;
        Ok(Self {
            id,
            tier,
            dir,
            files: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// A fresh, collision-free path inside the job directory.
    pub fn next_path(&self, extension: &str) -> PathBuf {
        self.dir.path().join(format!("{}.{}", Uuid::new_v4(), extension))
    }
}

impl Drop for DownloadJob {
    fn drop(&mut self) {
        // Release file guards before the directory itself goes.
        self.files.clear();
        log::debug!("Job {} released {}", self.id, self.dir.path().display());
    }
}

/// The single deliverable file. Removed from disk when dropped.
#[derive(Debug)]
pub struct AssembledArtifact {
    pub file: TempFile,
    pub kind: DeliveryKind,
}

impl AssembledArtifact {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Removes job directories left behind by a previous process that did not exit cleanly.
pub fn sweep_stale_jobs(work_dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(work_dir)? {
        let entry = entry?;
        let is_job_dir = entry.file_type()?.is_dir()
            && entry.file_name().to_string_lossy().starts_with(JOB_DIR_PREFIX);
        if is_job_dir {
            std::fs::remove_dir_all(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn temp_file_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"data").unwrap();

        drop(TempFile::new(path.clone()));
        assert!(!path.exists());

        // Never created: dropping the guard is a no-op.
        drop(TempFile::new(dir.path().join("missing.mp4")));
    }

    #[test]
    fn jobs_get_distinct_directories_and_paths() {
        let work = TempDir::new().unwrap();
        let first = DownloadJob::create(work.path(), QualityTier::P360).unwrap();
        let second = DownloadJob::create(work.path(), QualityTier::P360).unwrap();

        assert_ne!(first.dir(), second.dir());
        assert_ne!(first.next_path("mp4"), first.next_path("mp4"));
        assert!(first.next_path("m4a").starts_with(first.dir()));
    }

    #[test]
    fn dropping_a_job_removes_its_directory() {
        let work = TempDir::new().unwrap();
        let mut job = DownloadJob::create(work.path(), QualityTier::Audio).unwrap();
        let dir = job.dir().to_path_buf();
        let stray = job.next_path("part");
        std::fs::write(&stray, b"partial").unwrap();
        let tracked = job.next_path("m4a");
        std::fs::write(&tracked, b"audio").unwrap();
        job.files.push((crate::media::testing::audio("140", 128.0), TempFile::new(tracked)));

        drop(job);
        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn sweep_only_touches_job_directories() {
        let work = TempDir::new().unwrap();
        std::fs::create_dir(work.path().join("job-leftover")).unwrap();
        std::fs::write(work.path().join("job-leftover").join("a.mp4"), b"x").unwrap();
        std::fs::create_dir(work.path().join("keep")).unwrap();
        std::fs::write(work.path().join("job-file.txt"), b"x").unwrap();

        assert_eq!(sweep_stale_jobs(work.path()).unwrap(), 1);
        assert!(!work.path().join("job-leftover").exists());
        assert!(work.path().join("keep").exists());
        assert!(work.path().join("job-file.txt").exists());
    }
}
