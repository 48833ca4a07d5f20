mod config;
mod console;
mod deck;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use obs_client::{parse_endpoint, ObsWebsocket};
use shared::domain::ControllerMode;
use sync_core::{PresentationDriver, SceneController, SyncContext, SyncEngine};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::load_settings;
use deck::{Deck, DeckDriver};

#[derive(Parser, Debug)]
#[command(about = "Keeps a slide deck and obs scenes in step")]
struct Cli {
    /// Which side drives: `presentation` (ppt) or `scene` (obs).
    #[arg(long)]
    driver: Option<ControllerMode>,
    #[arg(long, default_value = "switcher.toml")]
    config: PathBuf,
    #[arg(long)]
    deck: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config);
    if let Some(driver) = cli.driver {
        settings.driver = driver;
    }
    if let Some(deck) = cli.deck {
        settings.deck = deck;
    }
    parse_endpoint(&settings.endpoint).context("invalid obs endpoint")?;

    let deck = Deck::load(&settings.deck)?;
    let presentation = DeckDriver::new(deck);
    info!(
        deck = %settings.deck.display(),
        slides = presentation.slide_count(),
        driver = %settings.driver,
        endpoint = %settings.endpoint,
        policy = %settings.dispatch_policy,
        "starting switcher"
    );

    let context = SyncContext::new(
        Arc::clone(&presentation) as Arc<dyn PresentationDriver>,
        ObsWebsocket::new() as Arc<dyn SceneController>,
        settings.sync_settings(),
    );
    let engine = SyncEngine::start(context, settings.driver).await;
    println!("commands: n(ext), p(rev), c(lick), q(uit)");

    let lines = console::spawn_stdin_lines()?;
    tokio::select! {
        _ = console::run(lines, presentation) => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("interrupted"),
            Err(err) => warn!(error = %err, "ctrl-c handler failed"),
        },
    }

    engine.shutdown().await;
    Ok(())
}
