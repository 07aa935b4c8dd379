use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use moodbot::api::{AlpacaClient, SpotifyClient};
use moodbot::config::{AlpacaCredentials, Settings, SpotifyCredentials, TickMode};
use moodbot::content::PlaylistCurator;
use moodbot::gateway::{
    ClockGateway, ContentGateway, InMemoryBroker, InMemoryCatalog, PositionLedger,
};
use moodbot::scheduler::TokioScheduler;
use moodbot::{BotError, ContentItem, ControlLoop, LoopExit};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const EXIT_STARTUP_FAILURE: u8 = 2;

/// Trades one symbol on a position toggle and builds playlists from the market's mood
#[derive(Parser, Debug)]
#[command(name = "moodbot", version, about)]
struct Cli {
    /// Settings file (defaults to ./moodbot.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick cadence: fast = 10s, standard = 60s, patient = 240s
    #[arg(long, value_enum)]
    mode: Option<TickMode>,

    /// Symbol to trade
    #[arg(long)]
    symbol: Option<String>,

    /// Shares per buy order
    #[arg(long)]
    quantity: Option<i64>,

    /// Run against an in-memory paper broker and catalog instead of the real APIs
    #[arg(long)]
    dry_run: bool,

    /// Minutes of trading before the paper session reaches its closing window (--dry-run)
    #[arg(long, default_value_t = 30)]
    session_minutes: u32,
}

struct Backends {
    clock: Arc<dyn ClockGateway>,
    ledger: Arc<dyn PositionLedger>,
    content: Arc<dyn ContentGateway>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("🚀 MoodBot starting");

    match run(Cli::parse()).await {
        Ok(LoopExit::SweepCompleted(report)) => {
            tracing::info!(
                "👋 MoodBot stopped after closing sweep ({} closed, {} failed)",
                report.closed.len(),
                report.failed.len()
            );
            ExitCode::SUCCESS
        }
        Ok(LoopExit::StopRequested) => {
            tracing::info!("👋 MoodBot stopped by operator");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("✗ Startup failed: {:#}", e);
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("moodbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> anyhow::Result<LoopExit> {
    let settings = load_settings(&cli)?;
    log_settings(&settings, cli.dry_run);

    let backends = if cli.dry_run {
        paper_backends(&settings, cli.session_minutes)
    } else {
        live_backends(&settings)?
    };

    let curator = PlaylistCurator::connect(
        backends.content,
        settings.observations.clone(),
        settings.gateway_timeout(),
    )
    .await
    .map_err(|e| BotError::StartupFailure(format!("content account check failed: {}", e)))?
    .with_search_limit(settings.search_limit);

    let (scheduler, stop) = TokioScheduler::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("⚠️  Received Ctrl+C, stopping at the next tick boundary...");
            stop.stop();
        }
    });

    let mut control = ControlLoop::new(
        &settings,
        backends.clock,
        backends.ledger,
        Some(curator),
        Box::new(scheduler),
    );

    tracing::info!("Press Ctrl+C to stop...");
    Ok(control.run().await)
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    if let Some(mode) = cli.mode {
        settings.mode = mode;
        settings.tick_interval_secs = None;
    }
    if let Some(symbol) = &cli.symbol {
        settings.symbol = symbol.to_uppercase();
    }
    if let Some(quantity) = cli.quantity {
        settings.order_quantity = quantity;
    }

    settings.validate().context("validating command-line overrides")?;
    Ok(settings)
}

fn log_settings(settings: &Settings, dry_run: bool) {
    tracing::info!("📊 Configuration:");
    tracing::info!("  Symbol: {} x{}", settings.symbol, settings.order_quantity);
    tracing::info!(
        "  Tick: {:?} ({:?} mode), closed-market backoff {:?}",
        settings.tick_interval(),
        settings.mode,
        settings.closed_backoff()
    );
    tracing::info!("  Closing window: {:?}", settings.closing_window());
    tracing::info!("  Gateway timeout: {:?}", settings.gateway_timeout());
    for observation in &settings.observations {
        tracing::info!(
            "    - {} {:+}",
            observation.symbol,
            observation.price_change
        );
    }
    if dry_run {
        tracing::info!("  🧪 Dry run: paper broker and catalog, no real orders");
    }
}

fn live_backends(settings: &Settings) -> moodbot::Result<Backends> {
    let alpaca = Arc::new(AlpacaClient::new(
        AlpacaCredentials::from_env()?,
        settings.gateway_timeout(),
    )?);
    let spotify = SpotifyClient::new(
        SpotifyCredentials::from_env()?,
        settings.gateway_timeout(),
    )?;

    Ok(Backends {
        clock: alpaca.clone(),
        ledger: alpaca,
        content: Arc::new(spotify),
    })
}

fn paper_backends(settings: &Settings, session_minutes: u32) -> Backends {
    let open_for = chrono::Duration::minutes(
        i64::from(session_minutes) + settings.closing_window_mins as i64,
    );
    let broker = Arc::new(InMemoryBroker::live_session(Utc::now() + open_for));

    let tracks: Vec<ContentItem> = (1..=12)
        .map(|n| ContentItem {
            name: format!("Paper Track {}", n),
            uri: format!("spotify:track:paper{:02}", n),
            artist: Some("Paper Trail".to_string()),
        })
        .collect();
    let catalog = InMemoryCatalog::new("paper-listener").with_fallback_items(tracks);

    Backends {
        clock: broker.clone(),
        ledger: broker,
        content: Arc::new(catalog),
    }
}
