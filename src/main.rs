use std::time::Duration;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use plant_monitor_service::{
    alerts::{AlertLedger, RuleStore},
    api::{self, AppState},
    cache::TtlCache,
    config::Config,
    monitor::MonitorService,
    plants_api::PlantsApiClient,
    storage::KvStore,
    sync::{Connectivity, SyncCoordinator},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent — env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Durable local state: rules, alert ledger, pending sync queue
    let store = KvStore::new(&config.data_dir);
    let rules = RuleStore::load(store.clone()).await;
    let ledger = AlertLedger::load(store.clone()).await;
    info!(data_dir = %config.data_dir, "local state loaded");

    // Shared client for the external plants CRUD API
    let api_client = PlantsApiClient::new(&config)?;

    // Connectivity signal: assume online until a poll says otherwise
    let connectivity = Connectivity::new(true);

    // Sync coordinator drains the pending queue on offline → online edges
    let sync = SyncCoordinator::load(store, api_client.clone(), connectivity.clone()).await;
    tokio::spawn(sync.clone().run());

    // Supervised-plant cache shared by the monitor loop and the API
    let plants = TtlCache::new(Duration::from_secs(config.cache_ttl_secs));

    // Spawn the reading-poll / alert-evaluation loop
    {
        let monitor = MonitorService::new(
            api_client.clone(),
            plants.clone(),
            rules.clone(),
            ledger.clone(),
            connectivity,
            config.poll_interval_secs,
        );
        tokio::spawn(monitor.run());
    }

    // Start HTTP server
    let state = AppState {
        api: api_client,
        plants,
        rules,
        ledger,
        sync,
    };
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
