use std::time::Duration;

use dotenvy::dotenv;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use common::config::Config;
use common::logger;
use market_data::remote::BinanceClient;
use market_data::services::KlineFeed;
use strategy::{EmaProximitySignal, EngineSettings, SignalEngine};

use crate::services::{TelegramService, TeloxideSender};

mod services;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();

    let config = Config::from_env()?;
    info!(
        "Starting signal server: top {} symbols, intervals {:?}, timezone {}",
        config.top_symbols,
        config.intervals,
        config.timezone.name()
    );

    let (alert_tx, alert_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let telegram = TelegramService::new(TeloxideSender::new(config.telegram.bot_token.clone()));
    let mut notifier = tokio::spawn(telegram.start(alert_rx));

    let exchange = BinanceClient::new(&config.exchange)?;
    let feed = KlineFeed::new(&config.exchange.tld);
    let mut engine = SignalEngine::new(
        exchange,
        feed,
        Box::new(EmaProximitySignal::default()),
        EngineSettings::from_config(&config),
        alert_tx,
    );

    let mut engine_task = tokio::spawn(async move { engine.run(shutdown_rx).await });

    let result = tokio::select! {
        joined = &mut engine_task => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
            (&mut engine_task).await
        }
    };

    // The engine owned the only sender, so the worker ends once the queue is drained.
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut notifier).await.is_err() {
        warn!("Notification worker did not finish within {:?}, aborting", DRAIN_TIMEOUT);
        notifier.abort();
    }

    match result {
        Ok(Ok(())) => {
            info!("Signal server stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Signal server stopped with error: {}", e);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
