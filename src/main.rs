use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wallpath::adapters::inbound::{CommandHandler, KafkaCommandListener};
use wallpath::adapters::outbound::{
    connect, create_producer, FilePlanStore, FileWallSource, InMemoryPlanStore, KafkaExecutionChannel,
    PostgresPlanStore, PostgresWallSource,
};
use wallpath::application::{Dispatcher, PlanCache, PlanningService};
use wallpath::config::StoreBackend;
use wallpath::domains::path_planning::{PlanStore, StrategyRegistry, WallSource};
use wallpath::{ApplicationResult, Config};

#[tokio::main]
async fn main() -> ApplicationResult<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(Some(&config_path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting wallpath");
    info!(brokers = ?config.kafka.brokers, store = ?config.store.backend, "configuration loaded");

    let (walls, store): (Arc<dyn WallSource>, Arc<dyn PlanStore>) = match config.store.backend {
        StoreBackend::Memory => (
            Arc::new(FileWallSource::new(config.store.wall_directory.clone())),
            Arc::new(InMemoryPlanStore::new()),
        ),
        StoreBackend::File => (
            Arc::new(FileWallSource::new(config.store.wall_directory.clone())),
            Arc::new(FilePlanStore::new(config.store.directory.clone())),
        ),
        StoreBackend::Postgres => {
            let pool = connect(&config.postgres).await?;
            (
                Arc::new(PostgresWallSource::new(pool.clone())),
                Arc::new(PostgresPlanStore::new(pool)),
            )
        }
    };

    let cache = Arc::new(PlanCache::new(config.cache_settings()));
    let registry = Arc::new(StrategyRegistry::with_defaults());
    let planning = Arc::new(PlanningService::new(
        walls,
        store.clone(),
        cache.clone(),
        registry,
        config.planning_settings(),
    ));

    let producer = create_producer(&config.kafka)?;
    let channel = Arc::new(KafkaExecutionChannel::with_producer(
        producer.clone(),
        config.kafka.topics.robot_path.clone(),
    ));
    let dispatcher = Arc::new(
        Dispatcher::new(cache.clone(), store, channel, config.dispatch_pin())
            .with_source_name(config.kafka.client_id.clone()),
    );

    let handler = CommandHandler::new(planning, dispatcher);
    let listener = KafkaCommandListener::new(&config.kafka, producer, handler)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener_task = tokio::spawn(listener.run(shutdown_rx));

    let sweeper_cache = cache.clone();
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = sweeper_cache.purge_expired().await;
            if purged > 0 {
                info!(purged, "expired plans purged");
            }
        }
    });

    info!("wallpath started");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| wallpath::ApplicationError::Transport(e.to_string()))?;
    info!("Shutting down wallpath");

    let _ = shutdown_tx.send(true);
    sweeper.abort();
    let _ = listener_task.await;

    Ok(())
}
