pub mod settings;

pub use settings::{
    ApiKeySettings, AppSettings, DatabaseSettings, HealthMonitorSettings, PortRangeSettings,
    RecordingSettings, RouterSettings, Settings,
};
