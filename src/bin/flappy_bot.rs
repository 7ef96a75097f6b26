//! Headless Flappy Arena player
//!
//! In session mode it joins the coordinator at `COORDINATOR_URL`, readies up
//! and flies each run until interrupted. In solo mode it plays repeated
//! games with no coordinator. On unix, SIGUSR1 pauses or resumes a run and
//! restarts a finished solo game.

use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flappy_arena::client::{
    run_client, run_solo, ClientControl, FileHighScoreStore, HighScoreStore,
    MemoryHighScoreStore,
};
use flappy_arena::config::{ClientConfig, ClientMode};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ClientConfig::from_env()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let store: Box<dyn HighScoreStore> = match &config.high_score_path {
        Some(path) => Box::new(FileHighScoreStore::new(path)),
        None => match FileHighScoreStore::default_location() {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!(error = %e, "High scores will not be persisted");
                Box::new(MemoryHighScoreStore::new())
            }
        },
    };

    info!(
        name = %config.player_name,
        mode = ?config.mode,
        pilot = ?config.pilot,
        "Starting bot"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(async {
        let (controls_tx, controls) = mpsc::unbounded_channel();
        tokio::spawn(forward_pause_signal(controls_tx));

        match config.mode {
            ClientMode::Session => {
                run_client(config, store.as_ref(), controls, shutdown_signal()).await
            }
            ClientMode::Solo => {
                Ok(run_solo(config, store.as_ref(), controls, shutdown_signal()).await)
            }
        }
    })?;

    info!(
        runs = summary.runs,
        sessions = summary.sessions,
        high_score = summary.high_score,
        "Bot finished"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn forward_pause_signal(controls: mpsc::UnboundedSender<ClientControl>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut signal = match signal(SignalKind::user_defined1()) {
        Ok(signal) => signal,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGUSR1 handler, pause disabled");
            return;
        }
    };
    while signal.recv().await.is_some() {
        if controls.send(ClientControl::PauseOrReset).is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
async fn forward_pause_signal(_controls: mpsc::UnboundedSender<ClientControl>) {}
