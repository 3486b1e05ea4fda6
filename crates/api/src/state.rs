use std::sync::Arc;

use camfeed_config::Settings;
use camfeed_core::{
    HealthMonitor, IngestionOrchestrator, MongoStreamRepository, PortAllocator, RetentionManager,
    RoomHealthTracker, RouterClient, SessionRegistry, StreamRepository, connect_with_backoff,
};
use mongodb::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub repo: Arc<dyn StreamRepository>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub async fn new(db: Database, settings: Settings) -> anyhow::Result<Self> {
        let repo: Arc<dyn StreamRepository> = Arc::new(MongoStreamRepository::new(&db));
        let router: Arc<dyn RouterClient> = Arc::new(connect_with_backoff(&settings.router).await?);
        let ports = Arc::new(PortAllocator::new(settings.ports.clone()));
        let registry = Arc::new(SessionRegistry::new());
        let room_health = RoomHealthTracker::new();

        let orchestrator = Arc::new(IngestionOrchestrator::new(
            repo.clone(),
            router.clone(),
            ports,
            registry.clone(),
            settings.recording.clone(),
            settings.router.clone(),
            room_health.clone(),
        ));

        let health_monitor = Arc::new(HealthMonitor::new(
            router.clone(),
            orchestrator.clone(),
            room_health,
            settings.health.clone(),
        ));
        tokio::spawn(health_monitor.run());

        let retention = RetentionManager::new(settings.recording.clone());
        tokio::spawn(retention.run(std::time::Duration::from_secs(3600)));

        Ok(Self {
            db,
            settings,
            repo,
            orchestrator,
            registry,
        })
    }
}
