//! Capture sources: packet producers driven by the capture loop.
//!
//! A source is polled from the capture thread and must never block for long;
//! returning [`SourcePoll::Idle`] lets the loop move on to the next source.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use callscope_core::Packet;
use chrono::{DateTime, Utc};
use etherparse::{NetHeaders, PacketHeaders, TransportHeader};
use pcap::Linktype;

use crate::error::CaptureError;

mod listener;
mod live;
mod offline;

pub use listener::ListenerSource;
pub use live::LiveSource;
pub use offline::OfflineSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Capturing from a network device.
    Live,
    /// Replaying a capture file.
    Offline,
    /// Receiving packets mirrored by a remote agent.
    Listener,
}

impl CaptureMode {
    pub fn is_offline(self) -> bool {
        self == CaptureMode::Offline
    }
}

/// Outcome of polling a source once.
#[derive(Debug)]
pub enum SourcePoll {
    Packet(Packet),
    /// Nothing to read right now.
    Idle,
    /// The source is exhausted and will not be polled again.
    Finished,
}

/// Manager state visible to sources while they are polled.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    pub paused: bool,
    pub tls_server: Option<SocketAddr>,
    pub keyfile: Option<&'a Path>,
}

pub trait CaptureSource: Send {
    fn mode(&self) -> CaptureMode;

    fn name(&self) -> &str;

    fn poll(&mut self, ctx: &SourceContext<'_>) -> Result<SourcePoll, CaptureError>;

    /// Sources without filtering support accept every expression.
    fn apply_filter(&mut self, _filter: &str) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Releases the source when the manager shuts down.
    fn teardown(&mut self) {}
}

/// Converts a libpcap record into a [`Packet`].
///
/// Endpoints are filled in for UDP and TCP over IPv4 or IPv6 when the link
/// type is Ethernet or raw IP. Other frames keep no endpoints.
pub(crate) fn from_pcap(packet: pcap::Packet<'_>, linktype: Linktype) -> Packet {
    let ts = packet.header.ts;
    let timestamp = DateTime::from_timestamp(ts.tv_sec as i64, (ts.tv_usec as u32) * 1000)
        .unwrap_or_else(Utc::now);
    let captured = Packet::new(timestamp, packet.data.to_vec());
    match endpoints(linktype, packet.data) {
        Some((src, dst)) => captured.with_endpoints(src, dst),
        None => captured,
    }
}

fn endpoints(linktype: Linktype, frame: &[u8]) -> Option<(SocketAddr, SocketAddr)> {
    let headers = match linktype {
        Linktype::ETHERNET => PacketHeaders::from_ethernet_slice(frame).ok()?,
        Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => {
            PacketHeaders::from_ip_slice(frame).ok()?
        }
        _ => return None,
    };

    let (src_ip, dst_ip): (IpAddr, IpAddr) = match headers.net? {
        NetHeaders::Ipv4(ip, _) => (ip.source.into(), ip.destination.into()),
        NetHeaders::Ipv6(ip, _) => (ip.source.into(), ip.destination.into()),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    let (src_port, dst_port) = match headers.transport? {
        TransportHeader::Udp(udp) => (udp.source_port, udp.destination_port),
        TransportHeader::Tcp(tcp) => (tcp.source_port, tcp.destination_port),
        _ => return None,
    };

    Some((
        SocketAddr::new(src_ip, src_port),
        SocketAddr::new(dst_ip, dst_port),
    ))
}

pub(crate) fn filter_error(source: &str, err: pcap::Error) -> CaptureError {
    CaptureError::Filter {
        source_name: source.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;
    use pcap::PacketHeader;

    fn sip_over_ethernet() -> Vec<u8> {
        let payload = b"INVITE sip:bob@example.com SIP/2.0";
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .udp(5062, 5060);
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();
        frame
    }

    fn record(frame: &[u8]) -> (PacketHeader, &[u8]) {
        let header = PacketHeader {
            ts: libc::timeval {
                tv_sec: 1_700_000_000,
                tv_usec: 250_000,
            },
            caplen: frame.len() as u32,
            len: frame.len() as u32,
        };
        (header, frame)
    }

    #[test]
    fn ethernet_udp_frames_carry_endpoints() {
        let frame = sip_over_ethernet();
        let (header, data) = record(&frame);
        let packet = from_pcap(pcap::Packet::new(&header, data), Linktype::ETHERNET);

        assert_eq!(packet.source, Some("10.0.0.1:5062".parse().unwrap()));
        assert_eq!(packet.destination, Some("10.0.0.2:5060".parse().unwrap()));
        assert_eq!(packet.len(), frame.len());
        assert_eq!(packet.timestamp.timestamp_subsec_micros(), 250_000);
    }

    #[test]
    fn raw_ip_frames_carry_endpoints() {
        let frame = sip_over_ethernet();
        // Strip the 14 byte Ethernet header.
        let (header, data) = record(&frame[14..]);
        let packet = from_pcap(pcap::Packet::new(&header, data), Linktype::RAW);

        assert_eq!(packet.destination, Some("10.0.0.2:5060".parse().unwrap()));
    }

    #[test]
    fn unparsed_frames_have_no_endpoints() {
        let frame = sip_over_ethernet();
        let (header, data) = record(&frame);
        let cooked = from_pcap(pcap::Packet::new(&header, data), Linktype::LINUX_SLL);
        assert!(cooked.source.is_none());

        let (header, data) = record(b"garbage");
        let garbage = from_pcap(pcap::Packet::new(&header, data), Linktype::ETHERNET);
        assert!(garbage.destination.is_none());
    }
}
