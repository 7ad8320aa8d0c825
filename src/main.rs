//! bleconf - Provisioning device agent.
//!
//! Serves the bleconf provisioning protocol over TCP as a stand-in for
//! the BLE notify/write transport, backed by simulated device
//! collaborators. One engine is built per accepted connection, the way
//! a device runs one provisioning session per BLE central; the session
//! token and settings persist across sessions through the file store.

mod sim;

use bleconf_engine::{chunker, Config, Engine, FileStore, SettingsStore};
use bleconf_protocol::OtaProgress;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bleconf")]
#[command(about = "Simulated bleconf provisioning device")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:7630")]
    listen: SocketAddr,

    /// Erase the stored token when a peer connects, forcing rotation
    #[arg(long)]
    erase_token: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration (from file if BLECONF_CONFIG is set, then env
    // overrides).
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("BLECONF_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            if std::env::var("BLECONF_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    let store: Arc<dyn SettingsStore> = Arc::new(FileStore::new(&config.store.path));
    let persisted = store.load()?;

    tracing::info!("Starting bleconf device agent");
    tracing::info!("  Listen address: {}", args.listen);
    tracing::info!("  Settings file: {}", config.store.path.display());
    if persisted.token.is_empty() {
        tracing::info!("  Session token: not set (rotation required)");
    } else {
        tracing::info!("  Session token: configured");
    }

    let listener = TcpListener::bind(args.listen).await?;

    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal, stopping");
                return Ok(());
            }
        };

        tracing::info!(%peer, "provisioning session opened");
        if let Err(e) = serve_session(socket, config.clone(), store.clone(), args.erase_token).await
        {
            tracing::warn!(%peer, error = %e, "session ended with error");
        } else {
            tracing::info!(%peer, "provisioning session closed");
        }
    }
}

/// Runs one provisioning session over an accepted socket.
async fn serve_session(
    socket: tokio::net::TcpStream,
    config: Config,
    store: Arc<dyn SettingsStore>,
    erase_token: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.set_nodelay(true)?;
    let (mut read_half, write_half) = socket.into_split();
    let write_half = Arc::new(tokio::sync::Mutex::new(write_half));

    let (device, mut ota_rx) = sim::SimDevice::new();
    let wifi = Arc::new(sim::SimWifi);
    let hub = Arc::new(sim::SimHub);

    let (engine, outbound_rx) = Engine::new(config, store, device.clone(), wifi, hub)?;
    engine.begin_provisioning(erase_token);

    // Outbound side: paced chunk writes.
    let chunk_size = engine.config().transport.chunk_size;
    let chunk_delay = engine.config().transport.chunk_delay();
    let pump_handle = tokio::spawn(async move {
        chunker::pump(outbound_rx, chunk_size, chunk_delay, move |chunk| {
            let writer = write_half.clone();
            async move { writer.lock().await.write_all(&chunk).await }
        })
        .await;
    });

    // Simulated OTA progress, reported the way a real download task
    // would call back into the engine.
    let ota_engine = engine.clone();
    let ota_handle = tokio::spawn(async move {
        while let Some(request) = ota_rx.recv().await {
            tracing::info!(url = %request.url, version = %request.version, "simulated ota download");
            for percent in [0u8, 25, 50, 75, 100] {
                ota_engine.notify_ota_progress(OtaProgress {
                    percent,
                    bytes_read: (percent as u16) * 160,
                });
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        }
    });

    let push_handle = engine.spawn_ap_push_task();

    // Inbound side: feed received bytes straight into the engine.
    let mut buf = [0u8; 256];
    loop {
        let n = read_half.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        engine.handle_bytes(&buf[..n]);
    }

    push_handle.abort();
    ota_handle.abort();
    drop(engine);
    let _ = pump_handle.await;

    if device.restart_requested() {
        tracing::info!("device would restart here; continuing to serve");
    }
    Ok(())
}
