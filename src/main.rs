use teloxide::prelude::*;

use std::sync::Arc;
use std::fs;

use anyhow::Error;
use crate::commands::Command;
use crate::config::Settings;
use crate::ffmpeg::FfmpegTranscoder;
use crate::handlers::{callback_handler, command_handler, link_handler};
use crate::media::Pipeline;
use crate::media::job::sweep_stale_jobs;
use crate::movies::{LinkShortener, MovieCatalog};
use crate::session::SessionStore;
use crate::yt_dlp_interface::utils::executable_name;
use crate::yt_dlp_interface::{YtDlpClient, locate_tool};
use teloxide::dptree;

mod commands;
mod config;
mod error;
mod ffmpeg;
mod handlers;
mod media;
mod movies;
mod session;
mod telegram_bot_api_uploader;
mod utils;
mod yt_dlp_interface;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Console logging for everything, errors mirrored to a file
    use std::sync::Mutex;
    use std::fs::OpenOptions;
    use log::LevelFilter;

    let error_log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("bot_errors.log")?;

    let error_log_file = Arc::new(Mutex::new(error_log_file));

    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .format(move |buf, record| {
            use std::io::Write;
            let output = format!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            );

            if record.level() == log::Level::Error {
                if let Ok(mut file) = error_log_file.try_lock() {
                    let _ = writeln!(file, "{}", &output);
                }
            }

            writeln!(buf, "{}", &output)
        })
        .filter(None, LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    log::info!("Starting media downloader bot...");
    let start_time = std::time::Instant::now();

    if let Err(e) = crate::config::load_environment() {
        log::error!("Failed to load environment: {}", e);
        return Err(e);
    }
    let settings = Settings::from_env()?;

    let libraries_dir = std::env::current_dir()?.join("lib");
    let ffmpeg_bundle_dir = libraries_dir.join("ffmpeg");

    let yt_dlp_path = match locate_tool(settings.yt_dlp_path.as_deref(), "yt-dlp", &libraries_dir.join(executable_name("yt-dlp"))) {
        Some(path) => path,
        None => {
            log::error!("yt-dlp not found (checked YT_DLP_PATH, {:?} and PATH)", libraries_dir);
            return Err(anyhow::Error::msg("yt-dlp not available"));
        }
    };
    log::info!("yt-dlp found at {:?}", yt_dlp_path);

    let ffmpeg_path = match locate_tool(settings.ffmpeg_path.as_deref(), "ffmpeg", &ffmpeg_bundle_dir.join(executable_name("ffmpeg"))) {
        Some(path) => path,
        None => {
            log::error!("ffmpeg not found (checked FFMPEG_PATH, {:?} and PATH)", ffmpeg_bundle_dir);
            return Err(anyhow::Error::msg("ffmpeg not available"));
        }
    };
    log::info!("ffmpeg found at {:?}", ffmpeg_path);

    fs::create_dir_all(&settings.work_dir)?;
    match sweep_stale_jobs(&settings.work_dir) {
        Ok(0) => {}
        Ok(n) => log::info!("Removed {} job directories left over from a previous run", n),
        Err(e) => log::warn!("Could not sweep {:?}: {}", settings.work_dir, e),
    }

    let yt_dlp = Arc::new(YtDlpClient::new(yt_dlp_path, ffmpeg_path.parent().map(|p| p.to_path_buf())));
    let pipeline = Arc::new(Pipeline::new(
        yt_dlp.clone(),
        yt_dlp,
        Arc::new(FfmpegTranscoder::new(ffmpeg_path)),
        settings.work_dir.clone(),
    ));

    let http = reqwest::Client::new();
    let shortener = settings
        .urlshortx_api_key
        .clone()
        .map(|key| LinkShortener::new(http.clone(), key));
    if shortener.is_none() {
        log::info!("URLSHORTX_API_KEY not set, movie links are sent unshortened");
    }
    let catalog = Arc::new(MovieCatalog::new(http.clone(), settings.movie_site.clone(), shortener));
    let sessions = Arc::new(SessionStore::new(settings.session_capacity, settings.session_ttl));

    let bot = Bot::new(&settings.bot_token);

    let handler = dptree::entry()
        .branch(Update::filter_message().filter_command::<Command>().endpoint(command_handler))
        .branch(Update::filter_message().endpoint(link_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    log::info!("Bot initialization completed in {:.2?}", start_time.elapsed());
    log::info!("Starting to dispatch updates...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![sessions, pipeline, catalog, http])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
