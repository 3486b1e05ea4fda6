use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use camfeed_config::HealthMonitorSettings;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::orchestrator::IngestionOrchestrator;
use crate::room_health::{RestartDecision, RoomHealthTracker};
use crate::router_client::RouterClient;

#[derive(Default)]
struct ProducerTrack {
    last_packets: Option<u64>,
    stale_count: u32,
}

/// Background loop that polls the router's producer stats for every
/// producer it knows about and restarts a camera's stream once its
/// producer's `packets_received` stops advancing for `stale_threshold`
/// consecutive checks (§4.7) — staleness is a property of the packet
/// counter, not of any flag the router hands back.
///
/// Restart bookkeeping (cooldown, attempt cap, FAILED) lives in the shared
/// `RoomHealthTracker` rather than here, so the orchestrator and this
/// monitor stay decoupled (§9): a successful Start resets it directly,
/// this monitor only ever asks it for a decision.
pub struct HealthMonitor {
    router: Arc<dyn RouterClient>,
    orchestrator: Arc<IngestionOrchestrator>,
    room_health: Arc<RoomHealthTracker>,
    settings: HealthMonitorSettings,
    producers: Mutex<HashMap<String, ProducerTrack>>,
}

impl HealthMonitor {
    pub fn new(
        router: Arc<dyn RouterClient>,
        orchestrator: Arc<IngestionOrchestrator>,
        room_health: Arc<RoomHealthTracker>,
        settings: HealthMonitorSettings,
    ) -> Self {
        Self {
            router,
            orchestrator,
            room_health,
            settings,
            producers: Mutex::new(HashMap::new()),
        }
    }

    /// Runs forever, checking on the configured interval. Intended to be
    /// spawned as its own task for the lifetime of the process.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.settings.check_interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = self.check_once().await {
                warn!(error = %e, "health check pass failed");
            }
        }
    }

    pub async fn check_once(&self) -> anyhow::Result<()> {
        let stats = self.router.get_all_producer_stats().await?;
        let mut seen = HashSet::with_capacity(stats.len());

        for p in &stats {
            seen.insert(p.producer_id.clone());
            let Ok(camera_id) = p.room_id.parse::<Uuid>() else {
                warn!(room_id = %p.room_id, "producer stats for a non-UUID room id, skipping");
                continue;
            };

            let advanced = {
                let mut tracks = self.producers.lock();
                let track = tracks.entry(p.producer_id.clone()).or_default();
                let advanced = match track.last_packets {
                    Some(prev) => p.packets_received > prev,
                    None => true,
                };
                track.last_packets = Some(p.packets_received);
                track.stale_count = if advanced { 0 } else { track.stale_count + 1 };
                advanced
            };

            if advanced {
                self.room_health.mark_healthy(camera_id);
                continue;
            }

            let stale_count = self
                .producers
                .lock()
                .get(&p.producer_id)
                .map(|t| t.stale_count)
                .unwrap_or(0);
            if stale_count < self.settings.stale_threshold {
                continue;
            }

            let decision = self.room_health.try_begin_restart(
                camera_id,
                Duration::from_secs(self.settings.restart_cooldown_secs),
                self.settings.max_restart_attempts,
            );
            match decision {
                RestartDecision::Start => {
                    info!(%camera_id, producer_id = %p.producer_id, "restarting stale stream");
                    if let Err(e) = self.orchestrator.restart_stream(camera_id, "health_monitor").await {
                        warn!(%camera_id, error = %e, "auto-restart failed");
                    }
                }
                RestartDecision::Cooldown => {}
                RestartDecision::Capped => {
                    warn!(%camera_id, "max restart attempts reached, giving up on this camera");
                }
            }
        }

        // Drop bookkeeping for producers the router no longer reports —
        // closed elsewhere (Stop, a prior restart) and no longer our concern.
        self.producers.lock().retain(|id, _| seen.contains(id));
        Ok(())
    }
}
