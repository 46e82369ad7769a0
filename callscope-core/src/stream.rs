//! ## callscope-core::stream
//! **Reconstructed RTP/RTCP media flows**
//!
//! A [`MediaStream`] ties the packets of one media flow to the signaling
//! exchange and the SDP media line that negotiated it. The session store
//! creates and destroys streams; the capture thread feeds them packets while
//! the UI reads counters concurrently, so all mutable state is either atomic
//! or behind a short-lived lock.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::packet::Packet;
use crate::rtp::standard_encoding;
use crate::sdp::SdpMedia;
use crate::time::{Clock, MonotonicClock};

/// Time without packets after which a stream is shown as inactive.
pub const STREAM_INACTIVE_THRESHOLD: Duration = Duration::from_secs(3);

/// Identifier of the signaling exchange (dialog) a stream belongs to.
///
/// Lookup-only: the session store resolves it to the exchange it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Rtp,
    Rtcp,
}

#[derive(Debug, Default, Clone, Copy)]
struct Endpoints {
    src: Option<SocketAddr>,
    dst: Option<SocketAddr>,
}

pub struct MediaStream {
    kind: StreamKind,
    exchange: ExchangeId,
    media: Weak<SdpMedia>,
    endpoints: RwLock<Endpoints>,
    format: AtomicU8,
    packets: Mutex<Vec<Arc<Packet>>>,
    count: AtomicU32,
    first_packet: OnceLock<DateTime<Utc>>,
    /// Clock reading of the last packet, 0 until the first one arrives.
    last_activity: AtomicU64,
    changed: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl MediaStream {
    pub fn new(kind: StreamKind, exchange: ExchangeId, media: &Arc<SdpMedia>) -> Self {
        Self::with_clock(kind, exchange, media, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        kind: StreamKind,
        exchange: ExchangeId,
        media: &Arc<SdpMedia>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            kind,
            exchange,
            media: Arc::downgrade(media),
            endpoints: RwLock::new(Endpoints::default()),
            format: AtomicU8::new(0),
            packets: Mutex::new(Vec::new()),
            count: AtomicU32::new(0),
            first_packet: OnceLock::new(),
            last_activity: AtomicU64::new(0),
            changed: AtomicBool::new(false),
            clock,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    /// The negotiated media line, if the owning session still holds it.
    pub fn media(&self) -> Option<Arc<SdpMedia>> {
        self.media.upgrade()
    }

    pub fn set_src(&self, src: SocketAddr) {
        self.endpoints.write().src = Some(src);
    }

    pub fn set_dst(&self, dst: SocketAddr) {
        self.endpoints.write().dst = Some(dst);
    }

    pub fn set_endpoints(&self, src: SocketAddr, dst: SocketAddr) {
        let mut endpoints = self.endpoints.write();
        endpoints.src = Some(src);
        endpoints.dst = Some(dst);
    }

    pub fn src(&self) -> Option<SocketAddr> {
        self.endpoints.read().src
    }

    pub fn dst(&self) -> Option<SocketAddr> {
        self.endpoints.read().dst
    }

    pub fn set_format(&self, code: u8) {
        self.format.store(code, Ordering::Relaxed);
    }

    pub fn format_code(&self) -> u8 {
        self.format.load(Ordering::Relaxed)
    }

    /// Records a packet belonging to this flow.
    pub fn add_packet(&self, packet: Arc<Packet>) {
        self.last_activity
            .store(self.clock.now_ns(), Ordering::Release);
        self.changed.store(true, Ordering::Release);
        // Only the first call can win the cell.
        let _ = self.first_packet.set(packet.timestamp);
        self.packets.lock().push(packet);
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Capture timestamp of the first packet seen on this stream.
    pub fn first_packet_time(&self) -> Option<DateTime<Utc>> {
        self.first_packet.get().copied()
    }

    /// Snapshot of the retained packets in arrival order.
    pub fn packets(&self) -> Vec<Arc<Packet>> {
        self.packets.lock().clone()
    }

    /// Returns whether packets arrived since the last call, clearing the flag.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    /// Display name of the negotiated payload format.
    ///
    /// Static RFC 3551 assignments take precedence over whatever the SDP media
    /// line declares for the same code.
    pub fn format_name(&self) -> Option<String> {
        let code = self.format_code();
        if let Some(encoding) = standard_encoding(code) {
            return Some(encoding.format.to_string());
        }

        let media = self.media.upgrade()?;
        media.format(code).map(|format| format.alias.clone())
    }

    /// Whether a packet arrived within [`STREAM_INACTIVE_THRESHOLD`].
    pub fn is_active(&self) -> bool {
        let last = self.last_activity.load(Ordering::Acquire);
        if last == 0 {
            return false;
        }
        let elapsed = self.clock.now_ns().saturating_sub(last);
        elapsed <= STREAM_INACTIVE_THRESHOLD.as_nanos() as u64
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("kind", &self.kind)
            .field("exchange", &self.exchange)
            .field("src", &self.src())
            .field("dst", &self.dst())
            .field("format", &self.format_code())
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::{MediaKind, SdpFormat};
    use crate::time::VirtualClock;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn audio_media() -> Arc<SdpMedia> {
        Arc::new(
            SdpMedia::new(MediaKind::Audio, "10.0.0.1:4000".parse().unwrap())
                .with_format(SdpFormat::new(0, "PCMU/8000", "custom-pcmu"))
                .with_format(SdpFormat::new(96, "opus/48000/2", "opus"))
                .with_format(SdpFormat::new(96, "opus/48000/1", "opus-mono")),
        )
    }

    fn packet_at(secs: i64) -> Arc<Packet> {
        let ts = Utc.timestamp_opt(secs, 0).unwrap();
        Arc::new(Packet::new(ts, vec![0x80, 0x00]))
    }

    fn stream_with_clock(media: &Arc<SdpMedia>, clock: &VirtualClock) -> MediaStream {
        MediaStream::with_clock(
            StreamKind::Rtp,
            ExchangeId(1),
            media,
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn new_stream_is_empty() {
        let media = audio_media();
        let stream = MediaStream::new(StreamKind::Rtcp, ExchangeId(7), &media);
        assert_eq!(stream.kind(), StreamKind::Rtcp);
        assert_eq!(stream.exchange(), ExchangeId(7));
        assert_eq!(stream.count(), 0);
        assert!(stream.first_packet_time().is_none());
        assert!(stream.src().is_none() && stream.dst().is_none());
        assert!(!stream.take_changed());
        assert!(!stream.is_active());
    }

    #[test]
    fn endpoints_can_be_set_separately_or_together() {
        let media = audio_media();
        let stream = MediaStream::new(StreamKind::Rtp, ExchangeId(1), &media);
        let a: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let b: SocketAddr = "10.0.0.2:5000".parse().unwrap();

        stream.set_src(a);
        assert_eq!(stream.src(), Some(a));
        assert_eq!(stream.dst(), None);

        stream.set_dst(b);
        assert_eq!(stream.dst(), Some(b));

        stream.set_endpoints(b, a);
        assert_eq!((stream.src(), stream.dst()), (Some(b), Some(a)));
    }

    #[test]
    fn add_packet_marks_changed_until_taken() {
        let media = audio_media();
        let stream = MediaStream::new(StreamKind::Rtp, ExchangeId(1), &media);
        stream.add_packet(packet_at(100));
        assert!(stream.take_changed());
        assert!(!stream.take_changed());
        stream.add_packet(packet_at(101));
        assert!(stream.take_changed());
    }

    #[test]
    fn packets_are_shared_with_the_caller() {
        let media = audio_media();
        let stream = MediaStream::new(StreamKind::Rtp, ExchangeId(1), &media);
        let packet = packet_at(5);
        stream.add_packet(packet.clone());
        assert_eq!(Arc::strong_count(&packet), 2);
        drop(stream);
        assert_eq!(Arc::strong_count(&packet), 1);
    }

    #[test]
    fn static_code_wins_over_dynamic_entry() {
        let media = audio_media();
        let stream = MediaStream::new(StreamKind::Rtp, ExchangeId(1), &media);
        stream.set_format(0);
        assert_eq!(stream.format_name().as_deref(), Some("g711u"));
    }

    #[test]
    fn dynamic_code_resolves_to_first_sdp_alias() {
        let media = audio_media();
        let stream = MediaStream::new(StreamKind::Rtp, ExchangeId(1), &media);
        stream.set_format(96);
        assert_eq!(stream.format_name().as_deref(), Some("opus"));
    }

    #[test]
    fn unknown_code_has_no_name() {
        let media = audio_media();
        let stream = MediaStream::new(StreamKind::Rtp, ExchangeId(1), &media);
        stream.set_format(111);
        assert_eq!(stream.format_name(), None);
    }

    #[test]
    fn dynamic_lookup_needs_live_media_descriptor() {
        let media = audio_media();
        let stream = MediaStream::new(StreamKind::Rtp, ExchangeId(1), &media);
        stream.set_format(96);
        drop(media);
        assert!(stream.media().is_none());
        assert_eq!(stream.format_name(), None);

        stream.set_format(8);
        assert_eq!(stream.format_name().as_deref(), Some("g711a"));
    }

    #[test]
    fn activity_expires_after_threshold() {
        let media = audio_media();
        let clock = VirtualClock::new(1_000);
        let stream = stream_with_clock(&media, &clock);

        stream.add_packet(packet_at(1));
        assert!(stream.is_active());

        clock.advance(STREAM_INACTIVE_THRESHOLD);
        assert!(stream.is_active());

        clock.advance(Duration::from_nanos(1));
        assert!(!stream.is_active());

        stream.add_packet(packet_at(2));
        assert!(stream.is_active());
    }

    proptest! {
        #[test]
        fn count_and_first_time_track_add_packet(
            stamps in proptest::collection::vec(0i64..4_000_000_000, 1..64)
        ) {
            let media = audio_media();
            let stream = MediaStream::new(StreamKind::Rtp, ExchangeId(1), &media);
            for secs in &stamps {
                stream.add_packet(packet_at(*secs));
            }
            prop_assert_eq!(stream.count() as usize, stamps.len());
            prop_assert_eq!(stream.packets().len(), stamps.len());
            let first = Utc.timestamp_opt(stamps[0], 0).unwrap();
            prop_assert_eq!(stream.first_packet_time(), Some(first));
        }

        #[test]
        fn activity_is_monotone_without_packets(
            steps in proptest::collection::vec(0u64..2_000_000_000, 1..32)
        ) {
            let media = audio_media();
            let clock = VirtualClock::new(1);
            let stream = stream_with_clock(&media, &clock);
            stream.add_packet(packet_at(0));
            prop_assert!(stream.is_active());

            let mut was_active = true;
            for step in steps {
                clock.advance(Duration::from_nanos(step));
                let active = stream.is_active();
                prop_assert!(was_active || !active);
                was_active = active;
            }
        }
    }
}
