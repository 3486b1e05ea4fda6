use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use camfeed_config::RecordingSettings;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Supervises a single ffmpeg child process that pulls an RTSP source and
/// produces two independent H.264 encodes from it (§6.3): a low-latency
/// baseline stream sent as RTP to the router, and a main-profile stream
/// written to an HLS ladder for hot storage (§6.4).
pub struct TranscoderSupervisor {
    stream_id: Uuid,
    child: Child,
    stderr_tail: std::sync::Arc<parking_lot::Mutex<Vec<String>>>,
}

impl TranscoderSupervisor {
    pub fn spawn(
        stream_id: Uuid,
        camera_id: Uuid,
        rtsp_url: &str,
        rtp_port: u16,
        ssrc: u32,
        router_host: &str,
        recording: &RecordingSettings,
    ) -> CoreResult<Self> {
        let camera_dir = Self::camera_dir(recording, camera_id);
        let today_dir = Self::day_dir(recording, camera_id, chrono::Utc::now().date_naive());
        std::fs::create_dir_all(&today_dir)
            .map_err(|e| CoreError::TranscoderError(format!("mkdir {today_dir:?}: {e}")))?;

        let playlist = Self::playlist_path(recording, camera_id);
        // `-strftime 1` lets ffmpeg re-evaluate both the day directory and
        // the segment name per segment; the directory created above only
        // guarantees the first day exists before the process starts.
        let segment_pattern = camera_dir.join("%Y%m%d").join("segment-%s.ts");

        // Embedded directly in the RTP muxer's `-ssrc` flag, which expects a
        // signed 32-bit value; SsrcCapture still observes the wire to learn
        // what the encoder actually sent.
        let signed_ssrc = ssrc as i32;

        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-rtsp_transport",
            "tcp",
            "-i",
            rtsp_url,
            "-map",
            "0:v:0",
            "-c:v",
            "libx264",
            "-profile:v",
            "baseline",
            "-preset",
            "ultrafast",
            "-tune",
            "zerolatency",
            "-payload_type",
            "96",
            "-ssrc",
            &signed_ssrc.to_string(),
            "-f",
            "rtp",
        ])
        .arg(format!("rtp://{router_host}:{rtp_port}?localport={rtp_port}"))
        .args([
            "-map",
            "0:v:0",
            "-c:v",
            "libx264",
            "-profile:v",
            "main",
            "-f",
            "hls",
            "-strftime",
            "1",
            "-hls_time",
            &recording.segment_seconds.to_string(),
            "-hls_list_size",
            &recording.playlist_segment_count.to_string(),
            "-hls_flags",
            "delete_segments",
            "-hls_segment_filename",
        ])
        .arg(segment_pattern.to_string_lossy().to_string())
        .arg(playlist.to_string_lossy().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| CoreError::TranscoderError(format!("spawn ffmpeg: {e}")))?;

        let stderr_tail = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        if let Some(stderr) = child.stderr.take() {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let mut buf = tail.lock();
                    if buf.len() >= 200 {
                        buf.remove(0);
                    }
                    buf.push(line);
                }
            });
        }

        info!(%stream_id, %camera_id, rtp_port, "transcoder spawned");
        Ok(Self {
            stream_id,
            child,
            stderr_tail,
        })
    }

    pub fn camera_dir(recording: &RecordingSettings, camera_id: Uuid) -> PathBuf {
        PathBuf::from(&recording.root).join(camera_id.to_string())
    }

    pub fn day_dir(recording: &RecordingSettings, camera_id: Uuid, date: chrono::NaiveDate) -> PathBuf {
        Self::camera_dir(recording, camera_id).join(date.format("%Y%m%d").to_string())
    }

    pub fn playlist_path(recording: &RecordingSettings, camera_id: Uuid) -> PathBuf {
        Self::camera_dir(recording, camera_id).join("stream.m3u8")
    }

    pub fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail.lock().clone()
    }

    /// Scans the captured stderr tail for ffmpeg's RTSP connection-failure
    /// phrasing, so a failed SSRC capture can be reported as the real root
    /// cause (source unreachable) instead of a generic timeout.
    pub fn connection_failure_reason(&self) -> Option<String> {
        const MARKERS: &[&str] = &[
            "Connection refused",
            "No route to host",
            "Connection timed out",
            "401 Unauthorized",
            "404 Not Found",
            "Name or service not known",
        ];
        self.stderr_tail
            .lock()
            .iter()
            .rev()
            .find(|line| MARKERS.iter().any(|m| line.contains(m)))
            .cloned()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn try_wait(&mut self) -> CoreResult<Option<std::process::ExitStatus>> {
        self.child
            .try_wait()
            .map_err(|e| CoreError::TranscoderError(e.to_string()))
    }

    /// Graceful SIGTERM, escalating to a hard kill if the process outlives
    /// the grace period.
    pub async fn terminate(&mut self, grace: Duration) -> CoreResult<()> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }
        }

        match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(stream_id = %self.stream_id, ?status, "transcoder exited after terminate");
                Ok(())
            }
            _ => {
                warn!(stream_id = %self.stream_id, "transcoder did not exit in time, killing");
                self.child
                    .kill()
                    .await
                    .map_err(|e| CoreError::TranscoderError(e.to_string()))
            }
        }
    }
}

/// Deterministic SSRC embedded directly in the transcoder's command line, so
/// the value is known before the process starts (needed for the RTP
/// muxer's `-ssrc` flag). Derived the same way `PortAllocator` derives a
/// camera's preferred port: a stable hash of the camera id.
pub fn chosen_ssrc(camera_id: Uuid) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(camera_id.as_bytes());
    let digest = hasher.finalize();
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Kills any ffmpeg process still pulling `rtsp_url` that a prior run left
/// behind — graceful SIGTERM first, SIGKILL after the usual grace gap if it
/// didn't exit. Matches against the RTSP URL rather than a pid set, since
/// this runs before a new session's pid exists (§4.6 step 2). Inherently
/// racy (another process could match the same grep) — best-effort cleanup,
/// never relied on for correctness.
pub async fn kill_orphans(rtsp_url: &str) -> CoreResult<u32> {
    let pids = pgrep(rtsp_url).await?;
    if pids.is_empty() {
        return Ok(0);
    }

    #[cfg(unix)]
    for pid in &pids {
        unsafe {
            libc::kill(*pid, libc::SIGTERM);
        }
    }

    tokio::time::sleep(Duration::from_millis(1500)).await;

    #[cfg(unix)]
    for pid in pgrep(rtsp_url).await.unwrap_or_default() {
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
    }

    warn!(rtsp_url, count = pids.len(), "killed orphaned transcoder process(es)");
    Ok(pids.len() as u32)
}

async fn pgrep(pattern: &str) -> CoreResult<Vec<libc::pid_t>> {
    let output = Command::new("pgrep")
        .args(["-f", pattern])
        .output()
        .await
        .map_err(|e| CoreError::TranscoderError(format!("pgrep: {e}")))?;
    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text.lines().filter_map(|l| l.trim().parse().ok()).collect())
}

/// Finds ffmpeg processes feeding the router that the session registry no
/// longer tracks — left behind when a prior run was killed before it could
/// reap its own children — and kills them outright. Run periodically, not
/// inline with every stop.
pub async fn sweep_orphans(live_pids: &[u32]) -> CoreResult<u32> {
    let output = Command::new("pgrep")
        .args(["-f", "ffmpeg.*rtp://"])
        .output()
        .await
        .map_err(|e| CoreError::TranscoderError(format!("pgrep: {e}")))?;

    let mut swept = 0u32;
    let text = String::from_utf8_lossy(&output.stdout);
    for pid_str in text.lines() {
        let Ok(pid) = pid_str.trim().parse::<u32>() else {
            continue;
        };
        if live_pids.contains(&pid) {
            continue;
        }
        #[cfg(unix)]
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGKILL);
        }
        warn!(pid, "killed orphaned transcoder process");
        swept += 1;
    }
    Ok(swept)
}
