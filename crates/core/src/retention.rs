use std::path::{Path, PathBuf};
use std::time::Duration;

use camfeed_config::RecordingSettings;
use tracing::{error, info, warn};

/// Disk usage bands that trigger progressively more aggressive cleanup
/// beyond the normal time-based prune, so a misbehaving camera filling a
/// volume can't take every other recording down with it.
const EMERGENCY_BAND_WARN: f64 = 0.85;
const EMERGENCY_BAND_URGENT: f64 = 0.90;
const EMERGENCY_BAND_CRITICAL: f64 = 0.95;

/// Targets each band prunes down to (§4.8).
const EMERGENCY_TARGET_URGENT: f64 = 0.85;
const EMERGENCY_TARGET_CRITICAL: f64 = 0.80;

pub enum Severity {
    Normal,
    Warn,
    Urgent,
    Critical,
}

/// Periodically deletes whole `<camera_id>/<YYYYMMDD>` directories older
/// than the configured retention window, and escalates to deleting the
/// oldest such directories across all cameras when the recording volume's
/// usage crosses an emergency band.
pub struct RetentionManager {
    settings: RecordingSettings,
}

impl RetentionManager {
    pub fn new(settings: RecordingSettings) -> Self {
        Self { settings }
    }

    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "retention sweep failed");
            }
        }
    }

    pub async fn sweep(&self) -> anyhow::Result<()> {
        let root = PathBuf::from(&self.settings.root);
        let freed = self.prune_by_age(&root).await?;
        if freed > 0 {
            info!(freed_bytes = freed, "time-based retention prune complete");
        }

        match self.disk_severity(&root)? {
            Severity::Normal => {}
            Severity::Warn => info!("recording volume above 85% full"),
            Severity::Urgent => {
                warn!("recording volume above 90% full, pruning to the 85% target");
                if !self.emergency_prune(&root, EMERGENCY_TARGET_URGENT).await? {
                    error!(severity = "critical", "could not bring disk usage down to the urgent target");
                }
            }
            Severity::Critical => {
                warn!("recording volume above 95% full, pruning to the 80% target");
                if !self.emergency_prune(&root, EMERGENCY_TARGET_CRITICAL).await? {
                    error!(severity = "critical", "could not bring disk usage down to the critical target");
                }
            }
        }
        Ok(())
    }

    /// Deletes every `<camera_id>/<YYYYMMDD>` directory whose parsed date is
    /// older than `retention_days`, reporting total bytes freed. Directory
    /// names that don't parse as `YYYYMMDD` are left alone (may be
    /// in-progress or foreign content) and logged.
    async fn prune_by_age(&self, root: &Path) -> anyhow::Result<u64> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(self.settings.retention_days as i64))
            .date_naive();
        let mut freed = 0u64;

        let mut cameras = match tokio::fs::read_dir(root).await {
            Ok(d) => d,
            Err(_) => return Ok(0),
        };
        while let Some(camera_entry) = cameras.next_entry().await? {
            let camera_path = camera_entry.path();
            if !camera_path.is_dir() {
                continue;
            }
            let mut days = match tokio::fs::read_dir(&camera_path).await {
                Ok(d) => d,
                Err(_) => continue,
            };
            while let Some(day_entry) = days.next_entry().await? {
                let day_path = day_entry.path();
                if !day_path.is_dir() {
                    continue;
                }
                let name = day_entry.file_name();
                let name = name.to_string_lossy().to_string();
                let Ok(date) = chrono::NaiveDate::parse_from_str(&name, "%Y%m%d") else {
                    warn!(dir = %name, "skipping malformed retention directory name");
                    continue;
                };
                if date < cutoff {
                    let size = Self::dir_size(&day_path).await.unwrap_or(0);
                    if tokio::fs::remove_dir_all(&day_path).await.is_ok() {
                        freed += size;
                    }
                }
            }
        }
        Ok(freed)
    }

    /// Removes the globally-oldest `<camera_id>/<YYYYMMDD>` directories,
    /// one at a time, until `disk_used_ratio` drops below `target_ratio`.
    /// Returns whether the target was reached.
    async fn emergency_prune(&self, root: &Path, target_ratio: f64) -> anyhow::Result<bool> {
        let mut day_dirs = self.all_day_dirs_sorted(root).await?;

        loop {
            if Self::disk_used_ratio(root)? < target_ratio {
                return Ok(true);
            }
            let Some(dir) = day_dirs.first().map(|(_, p)| p.clone()) else {
                return Ok(false);
            };
            day_dirs.remove(0);
            let freed = Self::dir_size(&dir).await.unwrap_or(0);
            if tokio::fs::remove_dir_all(&dir).await.is_ok() {
                info!(?dir, freed_bytes = freed, "emergency prune removed segment directory");
            }
        }
    }

    async fn all_day_dirs_sorted(
        &self,
        root: &Path,
    ) -> anyhow::Result<Vec<(chrono::NaiveDate, PathBuf)>> {
        let mut out = Vec::new();
        let mut cameras = match tokio::fs::read_dir(root).await {
            Ok(d) => d,
            Err(_) => return Ok(out),
        };
        while let Some(camera_entry) = cameras.next_entry().await? {
            let camera_path = camera_entry.path();
            if !camera_path.is_dir() {
                continue;
            }
            let mut days = match tokio::fs::read_dir(&camera_path).await {
                Ok(d) => d,
                Err(_) => continue,
            };
            while let Some(day_entry) = days.next_entry().await? {
                let day_path = day_entry.path();
                if !day_path.is_dir() {
                    continue;
                }
                let name = day_entry.file_name();
                if let Ok(date) = chrono::NaiveDate::parse_from_str(&name.to_string_lossy(), "%Y%m%d") {
                    out.push((date, day_path));
                }
            }
        }
        out.sort_by_key(|(d, _)| *d);
        Ok(out)
    }

    fn dir_size<'a>(
        path: &'a Path,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<u64>> + Send + 'a>> {
        Box::pin(async move {
            let mut total = 0u64;
            let mut entries = tokio::fs::read_dir(path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    total += Self::dir_size(&entry.path()).await?;
                } else {
                    total += meta.len();
                }
            }
            Ok(total)
        })
    }

    fn disk_severity(&self, root: &Path) -> anyhow::Result<Severity> {
        let ratio = Self::disk_used_ratio(root)?;
        Ok(if ratio >= EMERGENCY_BAND_CRITICAL {
            Severity::Critical
        } else if ratio >= EMERGENCY_BAND_URGENT {
            Severity::Urgent
        } else if ratio >= EMERGENCY_BAND_WARN {
            Severity::Warn
        } else {
            Severity::Normal
        })
    }

    #[cfg(unix)]
    fn disk_used_ratio(root: &Path) -> anyhow::Result<f64> {
        use std::ffi::CString;
        use std::mem::MaybeUninit;

        let c_path = CString::new(root.to_string_lossy().as_bytes())?;
        let mut stat = MaybeUninit::<libc::statvfs>::uninit();
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
        if rc != 0 {
            return Ok(0.0);
        }
        let stat = unsafe { stat.assume_init() };
        let total = stat.f_blocks as f64 * stat.f_frsize as f64;
        let free = stat.f_bfree as f64 * stat.f_frsize as f64;
        if total == 0.0 {
            return Ok(0.0);
        }
        Ok((total - free) / total)
    }

    #[cfg(not(unix))]
    fn disk_used_ratio(_root: &Path) -> anyhow::Result<f64> {
        Ok(0.0)
    }
}
