use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::PipelineError;
use crate::media::{MediaSource, StreamDescriptor, StreamFetcher};
use crate::yt_dlp_interface::YtDlpClient;
use crate::yt_dlp_interface::utils::last_error_line;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").expect("valid ANSI regex"));

static PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\]\s+(\d+\.?\d*)%(?:\s+of\s+~?\s*(\d+\.?\d*[KMGT]?i?B))?")
        .expect("valid progress regex")
});

#[async_trait]
impl StreamFetcher for YtDlpClient {
    async fn fetch(
        &self,
        source: &MediaSource,
        stream: &StreamDescriptor,
        dest: &Path,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), PipelineError> {
        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.arg("--format")
            .arg(&stream.format_id)
            .arg("--output")
            .arg(dest)
            .arg("--no-part")
            .arg("--no-mtime")
            .arg("--no-playlist")
            .arg("--progress")
            .arg("--newline");
        if let Some(ffmpeg_dir) = &self.ffmpeg_dir {
            cmd.arg("--ffmpeg-location").arg(ffmpeg_dir);
        }
        cmd.arg(&source.url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| PipelineError::Fetch(format!("failed to run yt-dlp: {}", e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Fetch("yt-dlp stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::Fetch("yt-dlp stderr not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            read_lossy_lines(BufReader::new(stderr), |line| {
                log::trace!("yt-dlp stderr: {}", line);
                collected.push_str(line);
                collected.push('\n');
            })
            .await;
            collected
        });

        follow_progress(BufReader::new(stdout), &stream.format_id, progress).await;

        let status = child
            .wait()
            .await
            .map_err(|e| PipelineError::Fetch(format!("yt-dlp did not finish: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            log::error!("yt-dlp failed for format {} of {}: {}", stream.format_id, source.url, stderr.trim());
            return Err(PipelineError::Fetch(last_error_line(&stderr)));
        }
        if !dest.exists() {
            return Err(PipelineError::Fetch(format!(
                "yt-dlp reported success but {} is missing",
                dest.display()
            )));
        }
        log::info!("Fetched format {} to {}", stream.format_id, dest.display());
        Ok(())
    }
}

/// Calls `on_line` for every line of `reader` until EOF. Invalid UTF-8 is
/// replaced rather than ending the read, so the child never blocks on a full pipe.
async fn read_lossy_lines<R>(mut reader: R, mut on_line: impl FnMut(&str))
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => on_line(String::from_utf8_lossy(&buf).trim_end()),
            Err(e) => {
                log::warn!("Failed to read yt-dlp output: {}", e);
                break;
            }
        }
    }
}

/// Forwards every progress line of yt-dlp's stdout to `progress`, logging each quarter.
async fn follow_progress<R>(reader: R, format_id: &str, progress: &(dyn Fn(f64) + Send + Sync))
where
    R: AsyncBufRead + Unpin,
{
    let mut last_logged = 0.0f64;
    read_lossy_lines(reader, |line| {
        log::trace!("yt-dlp stdout: {}", line);
        let Some((percentage, total)) = parse_progress_line(line) else {
            return;
        };
        progress(percentage);
        if percentage >= last_logged + 25.0 || (percentage >= 100.0 && last_logged < 100.0) {
            last_logged = percentage;
            log::debug!(
                "Format {}: {:.1}% of {}",
                format_id,
                percentage,
                total.map_or("unknown size".to_string(), |b| format!("{:.1} MB", b as f64 / 1_048_576.0))
            );
        }
    })
    .await;
}

/// Extracts the percentage and, when printed, the total size in bytes from a
/// yt-dlp `--newline` progress line.
pub fn parse_progress_line(line: &str) -> Option<(f64, Option<u64>)> {
    let clean_line = ANSI_ESCAPE.replace_all(line, "");
    let caps = PROGRESS.captures(&clean_line)?;
    let percentage = caps[1].parse::<f64>().ok()?;
    let total = caps.get(2).and_then(|m| parse_size_string(m.as_str()));
    Some((percentage, total))
}

fn parse_size_string(s: &str) -> Option<u64> {
    let s_clean = s.trim().to_lowercase();
    let number_end = s_clean
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s_clean.len());
    let (number, unit) = s_clean.split_at(number_end);
    let multiplier: f64 = match unit.trim_end_matches('b').trim_end_matches('i') {
        "" => 1.0,
        "k" => 1_024.0,
        "m" => 1_048_576.0,
        "g" => 1_073_741_824.0,
        "t" => 1_099_511_627_776.0,
        _ => return None,
    };
    number.parse::<f64>().ok().map(|n| (n * multiplier) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_with_total() {
        let (pct, total) = parse_progress_line("[download]  42.5% of   10.00MiB at  1.20MiB/s ETA 00:05").unwrap();
        assert_eq!(pct, 42.5);
        assert_eq!(total, Some(10 * 1_048_576));
    }

    #[test]
    fn parses_estimated_total_and_ansi_codes() {
        let line = "\x1b[0;94m[download]\x1b[0m 100% of ~ 3.50KiB";
        let (pct, total) = parse_progress_line(line).unwrap();
        assert_eq!(pct, 100.0);
        assert_eq!(total, Some(3584));
    }

    #[test]
    fn ignores_non_progress_lines() {
        assert!(parse_progress_line("[youtube] abc123: Downloading webpage").is_none());
        assert!(parse_progress_line("[info] Downloading 1 format(s): 18").is_none());
    }

    #[test]
    fn parses_percentage_without_size() {
        assert_eq!(parse_progress_line("[download]   7.0%"), Some((7.0, None)));
    }

    #[tokio::test]
    async fn progress_survives_invalid_utf8_lines() {
        let output: &[u8] = b"[youtube] abc: Downloading\n[download]  10.0% of 1.00MiB\n\xff\xfe broken \xc3\n[download] 100.0% of 1.00MiB\n";
        let seen = std::sync::Mutex::new(Vec::new());
        let record = |pct: f64| seen.lock().unwrap().push(pct);

        follow_progress(BufReader::new(output), "18", &record).await;

        assert_eq!(*seen.lock().unwrap(), vec![10.0, 100.0]);
    }

    #[tokio::test]
    async fn last_line_without_newline_is_read() {
        let output: &[u8] = b"first\nlast";
        let mut lines = Vec::new();

        read_lossy_lines(BufReader::new(output), |line| lines.push(line.to_string())).await;

        assert_eq!(lines, ["first", "last"]);
    }

    #[test]
    fn size_units() {
        assert_eq!(parse_size_string("2GiB"), Some(2 * 1_073_741_824));
        assert_eq!(parse_size_string("512B"), Some(512));
        assert_eq!(parse_size_string("1.5MB"), Some(1_572_864));
        assert_eq!(parse_size_string("12XB"), None);
    }
}
