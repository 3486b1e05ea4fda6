use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct RoomHealth {
    restart_attempts: u32,
    last_restart_at: Option<Instant>,
    failed: bool,
}

/// What the caller should do about a stale room, decided by
/// `RoomHealthTracker::try_begin_restart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Proceed — the attempt has already been recorded.
    Start,
    /// Still within the per-room cooldown window; skip this round.
    Cooldown,
    /// Attempt cap reached; the room is now marked FAILED.
    Capped,
}

/// Restart bookkeeping shared between the orchestrator and the health
/// monitor. A successful Start resets a room's counters here; the monitor
/// consults the same counters before deciding to restart — neither module
/// needs to read the other's internal state for this (§9).
#[derive(Default)]
pub struct RoomHealthTracker {
    rooms: Mutex<HashMap<Uuid, RoomHealth>>,
}

impl RoomHealthTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Called on every successful Start (fresh or reconnect): zeroes the
    /// restart-attempt counter and clears FAILED, so a camera that recovers
    /// isn't permanently capped by attempts it made before it recovered.
    pub fn mark_healthy(&self, camera_id: Uuid) {
        let mut rooms = self.rooms.lock();
        let entry = rooms.entry(camera_id).or_default();
        entry.restart_attempts = 0;
        entry.failed = false;
    }

    pub fn is_failed(&self, camera_id: Uuid) -> bool {
        self.rooms.lock().get(&camera_id).map(|r| r.failed).unwrap_or(false)
    }

    pub fn failed_rooms(&self) -> Vec<Uuid> {
        self.rooms
            .lock()
            .iter()
            .filter(|(_, r)| r.failed)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Decides whether a restart should happen now for `camera_id`. Within
    /// `cooldown` of the last restart: skip. Past cooldown but at or above
    /// `max_attempts`: mark FAILED and skip. Otherwise: record the attempt
    /// (increment the counter, stamp `last_restart_at`) and proceed.
    pub fn try_begin_restart(
        &self,
        camera_id: Uuid,
        cooldown: Duration,
        max_attempts: u32,
    ) -> RestartDecision {
        let mut rooms = self.rooms.lock();
        let entry = rooms.entry(camera_id).or_default();

        if let Some(last) = entry.last_restart_at {
            if last.elapsed() < cooldown {
                return RestartDecision::Cooldown;
            }
        }
        if entry.restart_attempts >= max_attempts {
            entry.failed = true;
            return RestartDecision::Capped;
        }
        entry.restart_attempts += 1;
        entry.last_restart_at = Some(Instant::now());
        RestartDecision::Start
    }
}
