mod config;
mod console;

use config::AppConfig;
use console::ConsoleTransport;
use speechbot_audio::{EngineKind, EspeakSynthesizer, GoogleTtsSynthesizer};
use speechbot_core::telemetry::{init_tracing, redact_secrets};
use speechbot_core::{
    ArtifactManager, Dispatcher, SpeechBot, SpeechSynthesizer, SqliteSessionStore, SystemClock,
    Translations,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Longest wait for in-flight conversions before the final sweep
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait up to `limit` for every task in `in_flight`; the rest are aborted.
/// Returns whether everything finished in time.
async fn drain(in_flight: &mut JoinSet<()>, limit: Duration) -> bool {
    let finished = tokio::time::timeout(limit, async {
        while in_flight.join_next().await.is_some() {}
    })
    .await
    .is_ok();
    if !finished {
        warn!(target = "speechbot", pending = in_flight.len(), "In-flight messages did not finish; aborting");
        in_flight.abort_all();
    }
    finished
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", redact_secrets(&e.to_string()));
        }
    }
    init_tracing();

    info!(target = "speechbot", "Starting SpeechBot console");

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = AppConfig::load();

    let translations = match &cfg.bot.locales_dir {
        Some(dir) => Translations::load_dir(dir)?,
        None => Translations::embedded()?,
    };
    let store = Arc::new(SqliteSessionStore::open(
        &cfg.bot.database_path,
        Arc::new(SystemClock),
    )?);
    let synthesizer: Arc<dyn SpeechSynthesizer> = match cfg.engine {
        EngineKind::Espeak => Arc::new(EspeakSynthesizer::new(Some(cfg.espeak.clone()))),
        EngineKind::Gtts => Arc::new(GoogleTtsSynthesizer::with_config(cfg.gtts.clone())),
    };
    info!(target = "speechbot", engine = synthesizer.name(), "Speech engine selected");

    let artifacts = Arc::new(ArtifactManager::from_config(&cfg.bot));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(cfg.bot.clone()),
        Arc::new(translations),
        store,
        synthesizer,
        Arc::clone(&artifacts),
        Arc::new(ConsoleTransport::new()),
    ));

    let bot = Arc::new(SpeechBot::new(Arc::clone(&dispatcher), artifacts));
    bot.start().await?;

    let sweeper = {
        let bot = Arc::clone(&bot);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Err(e) = bot.sweep_stale().await {
                    warn!(target = "speechbot", error = %e, "Periodic artifact sweep failed");
                }
            }
        })
    };

    // One task per inbound line so a slow conversion never blocks other users
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut reader = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut in_flight = JoinSet::new();
            loop {
                let next = tokio::select! {
                    line = lines.next_line() => line,
                    _ = stop_rx.changed() => break,
                };
                match next {
                    Ok(Some(line)) => {
                        let Some((user_id, body)) = console::parse_line(&line) else {
                            continue;
                        };
                        let dispatcher = Arc::clone(&dispatcher);
                        in_flight.spawn(async move {
                            let msg = console::to_message(user_id, body).await;
                            dispatcher.dispatch(msg).await;
                        });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(target = "speechbot", error = %e, "Failed to read input");
                        break;
                    }
                }
                while in_flight.try_join_next().is_some() {}
            }
            if drain(&mut in_flight, DRAIN_TIMEOUT).await {
                debug!(target = "speechbot", "In-flight messages finished");
            }
        })
    };

    tokio::select! {
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(target = "speechbot", error = %e, "Ctrl+C handler failed");
            }
            info!(target = "speechbot", "Shutting down...");
            if stop_tx.send(true).is_err() {
                debug!(target = "speechbot", "Reader already stopped");
            }
            if let Err(e) = (&mut reader).await {
                warn!(target = "speechbot", error = %e, "Reader task failed");
            }
        }
        _ = &mut reader => {
            info!(target = "speechbot", "Input closed");
        }
    }

    sweeper.abort();
    bot.shutdown().await?;
    Ok(())
}
