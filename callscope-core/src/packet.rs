//! Captured packet type shared by sources, sinks, the session store and streams.
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;

/// One captured network frame.
///
/// Packets are handed around as `Arc<Packet>`: the session store, every media
/// stream that saw the packet and any sink may hold a reference, and the frame
/// is released once the last holder drops it.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Capture timestamp as reported by the source.
    pub timestamp: DateTime<Utc>,

    /// Raw frame bytes (link layer for pcap sources, UDP payload for listeners).
    pub data: Bytes,

    /// Source endpoint, when the source already knows it.
    pub source: Option<SocketAddr>,

    /// Destination endpoint, when the source already knows it.
    pub destination: Option<SocketAddr>,
}

impl Packet {
    /// Creates a packet with no endpoint metadata.
    #[inline]
    pub fn new(timestamp: DateTime<Utc>, data: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            data: data.into(),
            source: None,
            destination: None,
        }
    }

    pub fn with_endpoints(mut self, source: SocketAddr, destination: SocketAddr) -> Self {
        self.source = Some(source);
        self.destination = Some(destination);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
