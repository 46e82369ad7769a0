//! Minimal session store for headless runs: counts traffic per endpoint pair.
//!
//! Pcap sources fill in endpoints for UDP and TCP over IP. Anything else,
//! such as ARP or cooked-mode frames, is counted under the `(None, None)` flow.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use callscope_capture::SessionStore;
use callscope_core::Packet;
use parking_lot::Mutex;
use tracing::{info, trace};

type Endpoints = (Option<SocketAddr>, Option<SocketAddr>);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub packets: u64,
    pub bytes: u64,
}

#[derive(Default)]
pub struct PacketTally {
    total: AtomicU64,
    flows: Mutex<HashMap<Endpoints, Tally>>,
}

impl PacketTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn flow(&self, src: Option<SocketAddr>, dst: Option<SocketAddr>) -> Tally {
        self.flows
            .lock()
            .get(&(src, dst))
            .copied()
            .unwrap_or_default()
    }

    /// Logs the busiest flows, largest first.
    pub fn report(&self, limit: usize) {
        let flows = self.flows.lock();
        let mut sorted: Vec<_> = flows.iter().collect();
        sorted.sort_by(|a, b| b.1.packets.cmp(&a.1.packets));

        info!(packets = self.total(), flows = flows.len(), "Capture totals");
        for ((src, dst), tally) in sorted.into_iter().take(limit) {
            info!(
                src = ?src,
                dst = ?dst,
                packets = tally.packets,
                bytes = tally.bytes,
                "Flow"
            );
        }
    }
}

impl SessionStore for PacketTally {
    fn process_packet(&self, packet: Arc<Packet>) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let mut flows = self.flows.lock();
        let tally = flows
            .entry((packet.source, packet.destination))
            .or_default();
        tally.packets += 1;
        tally.bytes += packet.len() as u64;
        trace!(len = packet.len(), "Stored packet");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn packet(src: &str, dst: &str, len: usize) -> Arc<Packet> {
        Arc::new(
            Packet::new(Utc::now(), vec![0u8; len])
                .with_endpoints(src.parse().unwrap(), dst.parse().unwrap()),
        )
    }

    #[test]
    fn counts_per_flow() {
        let tally = PacketTally::new();
        tally.process_packet(packet("10.0.0.1:5060", "10.0.0.2:5060", 100));
        tally.process_packet(packet("10.0.0.1:5060", "10.0.0.2:5060", 50));
        tally.process_packet(packet("10.0.0.2:5060", "10.0.0.1:5060", 10));

        assert_eq!(tally.total(), 3);
        let forward = tally.flow(
            Some("10.0.0.1:5060".parse().unwrap()),
            Some("10.0.0.2:5060".parse().unwrap()),
        );
        assert_eq!(forward, Tally { packets: 2, bytes: 150 });
    }

    #[test]
    fn packets_without_endpoints_share_a_flow() {
        let tally = PacketTally::new();
        tally.process_packet(Arc::new(Packet::new(Utc::now(), bytes::Bytes::from_static(b"abc"))));
        tally.process_packet(Arc::new(Packet::new(Utc::now(), bytes::Bytes::from_static(b"de"))));

        assert_eq!(tally.flow(None, None), Tally { packets: 2, bytes: 5 });
    }
}
