pub mod fetcher;
pub mod resolver;
pub mod utils;

use std::path::PathBuf;

pub use utils::locate_tool;

/// Media backend driving the `yt-dlp` executable. Resolves catalogs and
/// fetches single formats; never merges or converts on its own.
#[derive(Clone, Debug)]
pub struct YtDlpClient {
    pub yt_dlp_path: PathBuf,
    pub ffmpeg_dir: Option<PathBuf>,
}

impl YtDlpClient {
    pub fn new(yt_dlp_path: PathBuf, ffmpeg_dir: Option<PathBuf>) -> Self {
        YtDlpClient {
            yt_dlp_path,
            ffmpeg_dir,
        }
    }
}
