use std::sync::Arc;
use tracing::{info, Level};
use voxdial::application::{AudioBridge, CallLocks, CallService, Watchdog, WebhookDispatcher};
use voxdial::config::Config;
use voxdial::infrastructure::realtime::{OpenAiRealtimeConnector, RealtimeConnector};
use voxdial::infrastructure::telephony::{PlivoGateway, TelephonyGateway};
use voxdial::interface::api::{build_router, init_metrics, AppState};

use voxdial::domain::agent::AgentRepository;
use voxdial::domain::call::repository::CallRecordRepository;

#[cfg(feature = "postgres")]
use voxdial::infrastructure::persistence::{
    create_pool, run_migrations, PgAgentRepository, PgCallRecordRepository, PoolConfig,
};

#[cfg(not(feature = "postgres"))]
use voxdial::infrastructure::persistence::{InMemoryAgentRepository, InMemoryCallRecordRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting voxdial");

    // Load configuration
    let config = Config::from_env();
    info!(
        "Configuration loaded: callbacks via {}",
        config.telephony.base_url
    );

    // Initialize persistence
    #[cfg(feature = "postgres")]
    let (call_repository, agent_repository): (
        Arc<dyn CallRecordRepository>,
        Arc<dyn AgentRepository>,
    ) = {
        let pool_config = PoolConfig::new(config.database.url.clone());
        let pool = create_pool(&pool_config).await?;
        run_migrations(&pool).await?;

        (
            Arc::new(PgCallRecordRepository::new(pool.clone())),
            Arc::new(PgAgentRepository::new(pool)),
        )
    };

    #[cfg(not(feature = "postgres"))]
    let (call_repository, agent_repository): (
        Arc<dyn CallRecordRepository>,
        Arc<dyn AgentRepository>,
    ) = {
        info!("Postgres feature disabled; using in-memory stores");
        (
            Arc::new(InMemoryCallRecordRepository::new()),
            Arc::new(InMemoryAgentRepository::new()),
        )
    };

    // Wire up the application services
    let locks = Arc::new(CallLocks::new());

    let gateway: Arc<dyn TelephonyGateway> =
        Arc::new(PlivoGateway::new(config.telephony.clone()));
    let connector: Arc<dyn RealtimeConnector> =
        Arc::new(OpenAiRealtimeConnector::new(config.realtime.clone()));

    let bridge = Arc::new(AudioBridge::new(
        connector,
        call_repository.clone(),
        locks.clone(),
    ));

    let call_service = Arc::new(CallService::new(
        call_repository.clone(),
        agent_repository.clone(),
        gateway,
        locks.clone(),
        config.telephony.base_url.clone(),
    ));

    let dispatcher = Arc::new(WebhookDispatcher::new(
        call_repository.clone(),
        agent_repository.clone(),
        locks.clone(),
        bridge.clone(),
        config.telephony.auth_token.clone(),
    ));

    // Start the stale-call watchdog
    let watchdog = Arc::new(Watchdog::new(
        call_repository,
        locks,
        bridge.clone(),
        config.watchdog.clone(),
    ));
    let watchdog_handle = watchdog.spawn();

    // Initialize metrics exporter
    let prometheus_handle = init_metrics();

    // Start the API server
    let state = AppState {
        call_service,
        agent_repository,
        dispatcher,
        bridge,
    };
    let app = build_router(state, prometheus_handle);

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("API server listening on {}", bind);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("API server failed");
    });

    // Keep the server running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    server_handle.abort();
    if let Some(handle) = watchdog_handle {
        handle.abort();
    }

    Ok(())
}
