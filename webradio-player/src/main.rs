//! Web radio - main entry point
//!
//! Runs the web server by default. `--list` prints the channel list and
//! `--play` plays a channel or file directly, printing events until the
//! track ends.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webradio_common::config::{TomlConfig, CONFIG_ENV};
use webradio_player::app::read_channels;
use webradio_player::state::VERSION;
use webradio_player::{api, WebRadio};

/// Bus identity of the console event printer
const CONSOLE_ID: &str = "main";

/// Command-line arguments for webradio
#[derive(Parser, Debug)]
#[command(name = "webradio")]
#[command(about = "Web radio and music player")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Play a channel or file directly (no web interface)
    #[arg(short, long, conflicts_with = "list")]
    play: bool,

    /// Print the channel list
    #[arg(short, long)]
    list: bool,

    /// Force debug mode (overrides the configuration file)
    #[arg(short, long)]
    debug: bool,

    /// Don't print event messages
    #[arg(short, long)]
    quiet: bool,

    /// Channel number or file name for --play
    channel: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    config.global.debug |= args.debug;

    // Initialize tracing
    let default_filter = if config.global.debug {
        "webradio_player=debug,webradio_common=debug,tower_http=debug"
    } else {
        "webradio_player=info,webradio_common=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting webradio {}", VERSION);
    match &source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: compiled defaults"),
    }

    if args.list {
        if !args.quiet {
            println!("Channel list (webradio {})", VERSION);
        }
        for channel in read_channels(&config) {
            println!("{:2}: {}", channel.nr, channel.name);
        }
        return Ok(());
    }

    let target = if args.play {
        Some(
            args.channel
                .clone()
                .context("--play needs a channel number or file name")?,
        )
    } else {
        None
    };

    let app = WebRadio::open(config)
        .await
        .context("Failed to start webradio")?;

    // Ends on eof (direct play), on sys events and on signals
    let stop = CancellationToken::new();
    let printer = tokio::spawn(print_events(
        Arc::clone(&app),
        args.quiet,
        args.play,
        stop.clone(),
    ));

    let result = match target {
        Some(target) => play_direct(&app, &target, &stop).await,
        None => serve(&app, &stop).await,
    };

    stop.cancel();
    app.bus.unsubscribe(CONSOLE_ID);
    if let Err(e) = printer.await {
        warn!("Event printer failed: {}", e);
    }
    app.cleanup().await;
    result
}

/// Play a channel number or file and wait until playback ends
async fn play_direct(app: &Arc<WebRadio>, target: &str, stop: &CancellationToken) -> Result<()> {
    match target.parse::<usize>() {
        Ok(nr) => {
            app.radio
                .play_channel(nr)
                .await
                .with_context(|| format!("Failed to play channel {}", nr))?;
        }
        Err(_) => {
            app.player
                .play_file(Some(target), true)
                .await
                .with_context(|| format!("Failed to play {}", target))?;
        }
    }

    tokio::select! {
        _ = shutdown_signal() => {},
        _ = stop.cancelled() => {},
    }
    Ok(())
}

/// Run the web server until a signal arrives or a sys event stops us
async fn serve(app: &Arc<WebRadio>, stop: &CancellationToken) -> Result<()> {
    let bus = Arc::clone(&app.bus);
    let stop = stop.clone();
    let shutdown = async move {
        tokio::select! {
            _ = shutdown_signal() => {},
            _ = stop.cancelled() => {},
        }
        // Ends the SSE streams so the server can finish
        bus.shutdown().await;
    };

    api::run(Arc::clone(app), shutdown)
        .await
        .context("Web server error")
}

/// Print event texts to stdout
async fn print_events(app: Arc<WebRadio>, quiet: bool, direct: bool, stop: CancellationToken) {
    let events = app.bus.subscribe(CONSOLE_ID).await;

    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if !quiet && event.kind() != "keep_alive" {
            println!("{}", event.text);
        }
        if (direct && event.kind() == "eof") || event.kind() == "sys" {
            break;
        }
    }

    stop.cancel();
    info!("Finished processing events");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
