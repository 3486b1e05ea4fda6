use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub router: RouterSettings,
    pub recording: RecordingSettings,
    pub health: HealthMonitorSettings,
    pub ports: PortRangeSettings,
    pub api_key: ApiKeySettings,
}

/// HTTP surface bind address and CORS policy for the thin wrapper API.
#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

/// Connection details for the external media router RPC endpoint (§4.1, §6.2).
#[derive(Debug, Deserialize, Clone)]
pub struct RouterSettings {
    pub url: String,
    /// Peer IP used when connecting a plain-RTP transport to the transcoder's
    /// local source port (§6.6 ROUTER_HOST).
    pub host: String,
    pub request_timeout_secs: u64,
    pub reconnect_backoff_ms: u64,
}

/// HLS recording root and retention policy (§4.8, §6.4).
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingSettings {
    pub root: String,
    pub retention_days: u32,
    pub segment_seconds: u32,
    pub playlist_segment_count: u32,
}

/// HealthMonitor tunables (§4.7, §6.6).
#[derive(Debug, Deserialize, Clone)]
pub struct HealthMonitorSettings {
    pub check_interval_secs: u64,
    pub stale_threshold: u32,
    pub restart_cooldown_secs: u64,
    pub max_restart_attempts: u32,
}

/// Deterministic UDP port pool for PortAllocator (§4.4, §6.6).
#[derive(Debug, Deserialize, Clone)]
pub struct PortRangeSettings {
    pub start: u16,
    pub end: u16,
}

/// Minimal shared-secret gate standing in for the full auth stack the HTTP
/// surface would carry in production (§1 Non-goals: OAuth2/JWT issuance is
/// out of scope for the core, but *some* gate is ambient stack).
#[derive(Debug, Deserialize, Clone)]
pub struct ApiKeySettings {
    pub key: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("CAMFEED"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8080)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "camfeed")?
            .set_default("router.url", "ws://127.0.0.1:3001")?
            .set_default("router.host", "127.0.0.1")?
            .set_default("router.request_timeout_secs", 10)?
            .set_default("router.reconnect_backoff_ms", 500)?
            .set_default("recording.root", "/recordings/hot")?
            .set_default("recording.retention_days", 7)?
            .set_default("recording.segment_seconds", 6)?
            .set_default("recording.playlist_segment_count", 14400)?
            .set_default("health.check_interval_secs", 10)?
            .set_default("health.stale_threshold", 3)?
            .set_default("health.restart_cooldown_secs", 30)?
            .set_default("health.max_restart_attempts", 3)?
            .set_default("ports.start", 40000)?
            .set_default("ports.end", 49999)?
            .set_default("api_key.key", "change-me-in-production")?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
