//! tglog demo - replays a burst of log output into a Telegram chat.

mod logging;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use tglog::{DispatchMode, LogSink, SinkConfig};
use tracing::{error, info, warn};

/// tglog demo command-line interface.
#[derive(Parser)]
#[command(name = "tglog-demo")]
#[command(about = "Send a scripted burst of logs to a Telegram chat through tglog")]
#[command(version)]
struct Cli {
    /// Bot token from @BotFather
    #[arg(long, env = "TGLOG_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Target chat id
    #[arg(long, env = "TGLOG_CHAT_ID", allow_negative_numbers = true)]
    chat_id: Option<i64>,

    /// Forum topic inside the chat
    #[arg(long, env = "TGLOG_TOPIC_ID")]
    topic_id: Option<u64>,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated substrings that are never forwarded
    #[arg(long, value_delimiter = ',', default_values = ["DEBUG", "FLOODWAIT"])]
    exclude: Vec<String>,

    /// Deliver from a dedicated sender thread
    #[arg(long)]
    background: bool,

    /// Lines in the bulk burst that triggers the file upload
    #[arg(long, default_value_t = 400)]
    bulk_lines: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn sink_config(&self) -> anyhow::Result<SinkConfig> {
        let mut config = match &self.config {
            Some(path) => SinkConfig::load_from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => SinkConfig::default(),
        };
        config.load_from_env();

        if let Some(token) = &self.token {
            config.token = token.clone();
        }
        if let Some(chat_id) = self.chat_id {
            config.chat_id = chat_id;
        }
        if let Some(topic_id) = self.topic_id {
            config.topic_id = topic_id;
        }
        if !self.exclude.is_empty() {
            config.excluded_patterns = self.exclude.clone();
        }
        if self.background {
            config.dispatch = DispatchMode::Background;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.sink_config()?;

    let sink = LogSink::connect(config).context("failed to start Telegram log sink")?;
    println!("Using @{}", sink.bot_username().unwrap_or("unknown"));

    logging::init(&cli.log_level, sink.clone());

    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&interrupted))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&interrupted))?;

    run_scenario(cli.bulk_lines, &interrupted);

    if let Err(e) = sink.shutdown() {
        eprintln!("final flush failed: {e}");
    }
    Ok(())
}

fn run_scenario(bulk_lines: usize, interrupted: &AtomicBool) {
    info!("Testing if this thing actually runs");
    pause(Duration::from_millis(500), interrupted);

    // Dropped by the default exclude list
    info!("DEBUG: this never reaches Telegram");
    warn!("FLOODWAIT: neither does this");
    pause(Duration::from_millis(500), interrupted);

    info!("📈 Something happened here");
    info!(user = "user123", "👤 New user started the bot");
    pause(Duration::from_millis(500), interrupted);

    error!("❌ Damn! These errors!");
    warn!("🔄 Errors everywhere 😭😭😭");
    info!("✅ Error resolved 😍😍😍");
    pause(Duration::from_millis(500), interrupted);

    info!(lines = bulk_lines, "📊 Generating bulk logs for file upload test...");
    for i in 0..bulk_lines {
        if interrupted.load(Ordering::Relaxed) {
            break;
        }
        info!(entry = i, "Bulk log entry");
        if i % 20 == 0 {
            pause(Duration::from_millis(100), interrupted);
        }
    }
    info!("🏁 Demo completed");

    pause(Duration::from_secs(5), interrupted);
    info!("🏁 Did you receive the log file? Press Ctrl+C to exit");
    pause(Duration::from_secs(30), interrupted);
}

/// Sleep for `duration`, returning early once `interrupted` is set.
fn pause(duration: Duration, interrupted: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !interrupted.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}
