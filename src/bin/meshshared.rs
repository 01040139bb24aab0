use anyhow::Context;
use meshshare::api::{create_api_server, EngineLink};
use meshshare::config::FileshareConfig;
use meshshare::engine::EngineBridge;
use meshshare::event_manager::EventManager;
use meshshare::mesh::StaticPeerResolver;
use meshshare::metrics::install_recorder;
use meshshare::notify::{DesktopNotifier, Notifier, NotifyResult};
use meshshare::service::{ServiceLimits, TransferService};
use meshshare::storage::{CombinedStorage, JsonFile, NativeStorage};
use meshshare::system::{StdFilesystem, StdOsInfo};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "MESHSHARE_CONFIG";

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| FileshareConfig::default().storage_path.join("config.json"))
}

async fn stop_requested(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = config_path();
    let config = FileshareConfig::load(&config_path)?;
    info!(config = %config_path.display(), "Starting meshshare daemon");

    install_recorder().context("installing metrics recorder")?;

    std::fs::create_dir_all(&config.storage_path)
        .with_context(|| format!("creating {}", config.storage_path.display()))?;

    let (bridge, commands) = EngineBridge::new(&config.engine_history_path);
    let bridge = Arc::new(bridge);
    let storage = Arc::new(CombinedStorage::new(
        NativeStorage::new(bridge.clone()),
        JsonFile::new(&config.storage_path, config.history_size_max_bytes),
    ));

    let peers = Arc::new(StaticPeerResolver::new(config.mesh_enabled, config.peers.clone()));
    let filesystem = Arc::new(StdFilesystem);

    let event_manager = Arc::new(EventManager::new(
        storage,
        peers.clone(),
        filesystem.clone(),
        Arc::new(StdOsInfo),
        config.default_download_dir.clone(),
    ));
    event_manager.set_fileshare(bridge.clone());

    // Clicks on notification buttons come back through this channel
    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    {
        let event_manager = event_manager.clone();
        tokio::spawn(async move {
            while let Some(action) = action_rx.recv().await {
                let event_manager = event_manager.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || {
                    event_manager.handle_notification_action(action)
                })
                .await
                {
                    warn!(error = %e, "Notification action handler panicked");
                }
            }
        });
    }

    if config.notifications {
        if let Err(e) =
            event_manager.enable_notifications(Box::new(DesktopNotifier::new(action_tx.clone())))
        {
            error!(error = %e, "Failed to enable notifications");
        }
    }

    let service = Arc::new(TransferService::new(
        event_manager.clone(),
        bridge,
        peers,
        filesystem,
        Box::new(move || -> NotifyResult<Box<dyn Notifier>> {
            Ok(Box::new(DesktopNotifier::new(action_tx.clone())))
        }),
        ServiceLimits::from(&config),
    ));

    let shutdown = service.shutdown_signal();
    let app = create_api_server(service, Some(EngineLink::new(event_manager.clone(), commands)));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = stop_requested(shutdown) => info!("Stop requested"),
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        })
        .await?;

    event_manager.cancel_live_transfers();
    info!("Daemon stopped");
    Ok(())
}
