//! Showdeck Media Controller (showdeck-mc) - Main entry point
//!
//! Headless playback service for the dual-output presentation controller.
//! The dashboard UI and the audience-facing surface drive it over HTTP and
//! follow playback through the SSE event stream.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showdeck_common::events::{EventBus, ShowdeckEvent};
use showdeck_mc::api;
use showdeck_mc::config::TomlConfig;
use showdeck_mc::playback::{EngineConfig, PlaybackEngine};
use showdeck_mc::playlist::PlaylistManager;

/// Command-line arguments for showdeck-mc
#[derive(Parser, Debug)]
#[command(name = "showdeck-mc")]
#[command(about = "Media controller service for Showdeck")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "showdeck.toml", env = "SHOWDECK_MC_CONFIG")]
    config: PathBuf,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SHOWDECK_MC_PORT")]
    port: Option<u16>,

    /// Run on the simulated decoder even if the real backend is available
    #[arg(long)]
    simulated: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = TomlConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.simulated {
        config.backend.force_simulated = true;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("showdeck_mc={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.config.exists() {
        info!("Loaded configuration from {}", args.config.display());
    } else {
        info!(
            "No config file at {}, using defaults",
            args.config.display()
        );
    }
    info!("Starting Showdeck Media Controller on port {}", config.port);

    // Initialize core services
    let bus = Arc::new(EventBus::new(1000));
    let engine = Arc::new(PlaybackEngine::new(EngineConfig::from(&config), Arc::clone(&bus)).await);
    let playlist = Arc::new(PlaylistManager::new(Arc::clone(&bus)));
    info!(
        "Playback engine initialized (mock_decoder={})",
        engine.is_mock()
    );

    spawn_duration_enrichment(Arc::clone(&bus), Arc::clone(&playlist));

    // Build the application router
    let app_state = api::AppState {
        engine,
        playlist,
        bus,
        port: config.port,
    };
    let app = api::create_router(app_state);

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Stick engine-discovered durations onto the current playlist item
///
/// Duration arrives asynchronously after a load; the playlist is where the
/// operator expects to see it.
fn spawn_duration_enrichment(bus: Arc<EventBus>, playlist: Arc<PlaylistManager>) {
    use tokio::sync::broadcast::error::RecvError;

    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ShowdeckEvent::DurationChanged { seconds, .. }) => {
                    playlist.set_current_duration(seconds).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
