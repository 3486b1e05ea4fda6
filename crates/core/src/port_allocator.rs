use std::net::UdpSocket;

use camfeed_config::PortRangeSettings;
use dashmap::DashSet;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Derives a stable port for a camera's RTP session from a hash of its id,
/// so the same camera tends to land on the same port across restarts
/// (useful for firewall rules pinned to a camera), falling back to a
/// linear probe through the range on collision.
pub struct PortAllocator {
    range: PortRangeSettings,
    in_use: DashSet<u16>,
}

impl PortAllocator {
    pub fn new(range: PortRangeSettings) -> Self {
        Self {
            range,
            in_use: DashSet::new(),
        }
    }

    fn preferred_port(&self, camera_id: Uuid) -> u16 {
        let mut hasher = Sha256::new();
        hasher.update(camera_id.as_bytes());
        let digest = hasher.finalize();
        let span = (self.range.end - self.range.start + 1) as u32;
        let offset = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % span;
        self.range.start + offset as u16
    }

    /// Allocates a port for `camera_id`. Checks it isn't already claimed by
    /// this process and isn't bound by anything else on the host, probing
    /// forward through the range on conflict.
    pub fn allocate(&self, camera_id: Uuid) -> CoreResult<u16> {
        let preferred = self.preferred_port(camera_id);
        let span = self.range.end - self.range.start + 1;

        for i in 0..span {
            let candidate = self.range.start + ((preferred - self.range.start + i) % span);
            if self.in_use.contains(&candidate) {
                continue;
            }
            if Self::port_is_free(candidate) {
                self.in_use.insert(candidate);
                return Ok(candidate);
            }
        }
        Err(CoreError::PortRangeExhausted)
    }

    pub fn release(&self, port: u16) {
        self.in_use.remove(&port);
    }

    fn port_is_free(port: u16) -> bool {
        UdpSocket::bind(("0.0.0.0", port)).is_ok()
    }
}
