pub mod dao;
pub mod error;
pub mod health_monitor;
pub mod orchestrator;
pub mod port_allocator;
pub mod registry;
pub mod repository;
pub mod retention;
pub mod room_health;
pub mod router_client;
pub mod ssrc_capture;
pub mod state_machine;
pub mod transcoder;

pub use error::{CoreError, CoreResult};
pub use health_monitor::HealthMonitor;
pub use orchestrator::{IngestionOrchestrator, StartResult};
pub use port_allocator::PortAllocator;
pub use registry::{CameraSession, SessionRegistry};
pub use repository::{MongoStreamRepository, StreamRepository};
pub use retention::RetentionManager;
pub use room_health::{RestartDecision, RoomHealthTracker};
pub use router_client::{PlainTransport, ProducerStats, RouterClient, RouterRpcClient, connect_with_backoff};
pub use ssrc_capture::SsrcCapture;
