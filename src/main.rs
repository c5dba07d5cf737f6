//! DV Chapter Bot - Main Entry Point
//!
//! A Telegram bot that converts DaVinci Resolve marker exports into chapter
//! lists, using the marker color and separator each user picked.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use dv_chapter_bot::commands::{CommandHandler, MemoryGuard};
use dv_chapter_bot::config::{BotSettings, Messages, TelegramConfig};
use dv_chapter_bot::conversation::{ConversationSweeper, SweeperMessage};
use dv_chapter_bot::preferences::PreferenceStore;
use dv_chapter_bot::telegram::{TelegramBot, UpdateDispatcher};

/// Number of rotated log files kept on disk.
const LOG_FILES_KEPT: usize = 21;

/// Telegram bot turning EDL marker exports into chapter lists.
#[derive(Parser, Debug)]
#[command(name = "dv_chapter_bot")]
#[command(about = "Turn DaVinci Resolve EDL markers into chapter lists on Telegram")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Also write logs to this file (rotated daily). Overrides `LOGFILE_NAME`.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables before logging so LOGFILE_NAME is visible
    let env_loaded = dotenvy::from_filename(&args.env_file);

    let mut settings = BotSettings::from_env_with_defaults();
    if args.log_file.is_some() {
        settings.log_file.clone_from(&args.log_file);
    }

    // Initialize logging
    let _log_guard = init_logging(&args.log_level, settings.log_file.as_deref())?;

    if let Err(e) = env_loaded {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    settings
        .validate()
        .context("Bot settings validation failed")?;

    let messages = Messages::from_env_with_defaults(&settings);

    info!(
        "Loaded settings ({} marker colors, prompt TTL {}s, RAM threshold {} MiB)",
        settings.marker_colors.len(),
        settings.conversation_ttl_secs,
        settings.ram_threshold_mib
    );

    let store = PreferenceStore::open(&settings.preferences_path).with_context(|| {
        format!(
            "Failed to open preferences file {}",
            settings.preferences_path.display()
        )
    })?;

    // Connect to Telegram
    let (bot, updates) = TelegramBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    let bot = Arc::new(bot);
    let memory = MemoryGuard::system(settings.ram_threshold_mib);
    let handler = Arc::new(CommandHandler::new(
        Arc::new(settings),
        Arc::new(messages),
        Arc::new(store),
        memory,
    ));

    // Create sweeper channel
    let (sweeper_tx, sweeper_rx) = mpsc::channel::<SweeperMessage>(8);

    let sweeper = ConversationSweeper::new(Arc::clone(&handler), Arc::clone(&bot));
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run(sweeper_rx).await;
    });

    let dispatcher = UpdateDispatcher::new(Arc::clone(&bot), Arc::clone(&handler));

    info!("Bot is running. Use Ctrl+C to stop.");

    tokio::select! {
        () = dispatcher.run(updates) => {
            info!("Update stream ended, shutting down...");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    // Cleanup
    info!("Shutting down...");
    let _ = sweeper_tx.send(SweeperMessage::Shutdown).await;
    let _ = sweeper_handle.await;
    bot.disconnect();

    Ok(())
}

/// Initializes the logging subsystem.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(level: &str, log_file: Option<&std::path::Path>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = fmt::layer().with_target(false);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        return Ok(None);
    };

    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path
        .file_name()
        .context("Log file path has no file name")?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name.to_string_lossy())
        .max_log_files(LOG_FILES_KEPT)
        .build(directory)
        .context("Failed to create log file appender")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(fmt::layer().with_target(false).with_ansi(false).with_writer(writer))
        .init();

    Ok(Some(guard))
}
