use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use url::Url;

pub const DEFAULT_MOVIE_SITE: &str = "https://mkvcinemas.nexus";
const DEFAULT_SESSION_TTL_SECS: u64 = 15 * 60;
const DEFAULT_SESSION_CAPACITY: usize = 1000;

pub fn find_dotenv() -> Result<Option<PathBuf>> {
    // 1. Check directory where the executable is located
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(exe_dir) = current_exe.parent() {
            let exe_dir_dotenv = exe_dir.join(".env");
            if exe_dir_dotenv.exists() {
                return Ok(Some(exe_dir_dotenv));
            }
        }
    }

    // 2. Check current working directory (for cargo run compatibility)
    let current_dotenv = std::env::current_dir()?.join(".env");
    if current_dotenv.exists() {
        return Ok(Some(current_dotenv));
    }

    Ok(None)
}

pub fn load_environment() -> Result<()> {
    match find_dotenv()? {
        Some(path) => {
            dotenv::from_path(&path)?;
            log::info!("Loaded environment variables from {:?}", path);
        }
        None => {
            log::warn!("No .env file found. Using system environment variables.");
        }
    }
    Ok(())
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    /// Explicit tool locations; `None` means search `lib/` and `PATH`.
    pub yt_dlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub session_ttl: Duration,
    pub session_capacity: NonZeroUsize,
    pub movie_site: Url,
    pub urlshortx_api_key: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("TELOXIDE_TOKEN").ok_or_else(|| anyhow!("TELOXIDE_TOKEN must be set"))?;

        let session_ttl = match get("SESSION_TTL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("SESSION_TTL_SECS is not a number of seconds: {}", raw))?,
            ),
            None => Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        };

        let session_capacity = match get("SESSION_CAPACITY") {
            Some(raw) => raw
                .parse::<NonZeroUsize>()
                .with_context(|| format!("SESSION_CAPACITY must be a positive integer: {}", raw))?,
            None => NonZeroUsize::new(DEFAULT_SESSION_CAPACITY).ok_or_else(|| anyhow!("zero session capacity"))?,
        };

        let movie_site_raw = get("MOVIE_SITE_URL").unwrap_or_else(|| DEFAULT_MOVIE_SITE.to_string());
        let movie_site =
            Url::parse(&movie_site_raw).with_context(|| format!("MOVIE_SITE_URL is not a URL: {}", movie_site_raw))?;

        let work_dir = match get("WORK_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?.join("downloads"),
        };

        Ok(Settings {
            bot_token,
            yt_dlp_path: get("YT_DLP_PATH").map(PathBuf::from),
            ffmpeg_path: get("FFMPEG_PATH").map(PathBuf::from),
            work_dir,
            session_ttl,
            session_capacity,
            movie_site,
            urlshortx_api_key: get("URLSHORTX_API_KEY"),
        })
    }
}
