use color_eyre::{eyre::eyre, Result};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn, Level};

use wiredless_bridge::controller::VirtualPad;
use wiredless_bridge::dispatch::{BridgeEvent, BridgeStatus};
use wiredless_bridge::network::local_ip;
use wiredless_bridge::{logging, Bridge, BridgeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let log_handle = setup()?;

    let config = BridgeConfig::load()
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))?;
    log_handle
        .set_level(config.log_level())
        .map_err(|e| eyre!("Failed to apply log level: {}", e))?;

    info!("Local IP: {}", local_ip().await);
    info!("Listening address: {}", config.bind_addr());

    let pad = VirtualPad::new();
    let mut report = pad.subscribe();
    let (mut bridge, mut events) = Bridge::new(Box::new(pad), &config);

    bridge.start_server(config.port).await?;
    if config.auto_connect_controller {
        if let Err(e) = bridge.connect_controller().await {
            error!("Failed to connect virtual controller: {}", e);
        }
    }

    let logger = tokio::spawn(async move { log_events(&mut events).await });
    let sample_logger = tokio::spawn(log_samples(bridge.subscribe()));
    let report_logger = tokio::spawn(async move {
        while report.changed().await.is_ok() {
            debug!("Controller report: {:?}", *report.borrow_and_update());
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to wait for Ctrl-C: {}", e))?;
    info!("Ctrl-C received");

    bridge.shutdown().await?;
    drop(bridge);
    if let Err(e) = logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }
    sample_logger.abort();
    report_logger.abort();

    Ok(())
}

async fn log_events(events: &mut mpsc::UnboundedReceiver<BridgeEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BridgeEvent::SinkFailed(_) => error!("{}", event.log_line()),
            _ => info!("{}", event.log_line()),
        }
    }
}

async fn log_samples(mut status: watch::Receiver<BridgeStatus>) {
    let mut last_sample = None;
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().last_sample;
        if let Some(sample) = current.filter(|sample| Some(*sample) != last_sample) {
            debug!("\n{}", sample.describe());
        }
        last_sample = current;
    }
}

fn setup() -> Result<logging::LogHandle> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(logging::init(Level::INFO))
}
