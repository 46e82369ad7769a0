//! Negotiated SDP media descriptors.
//!
//! These are the already-parsed results of an offer/answer exchange. The
//! session store owns them (`Arc<SdpMedia>`); media streams only keep a
//! `Weak` reference for payload format lookups.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::CoreError;

/// Media type from an SDP `m=` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Text,
    Application,
    Message,
    Image,
    Unknown,
}

impl MediaKind {
    pub fn from_media_type(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "audio" => MediaKind::Audio,
            "video" => MediaKind::Video,
            "text" => MediaKind::Text,
            "application" => MediaKind::Application,
            "message" => MediaKind::Message,
            "image" => MediaKind::Image,
            _ => MediaKind::Unknown,
        }
    }
}

/// One payload format declared for a media line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpFormat {
    /// Payload type code.
    pub id: u8,
    /// Encoding as declared, e.g. `opus/48000/2`.
    pub name: String,
    /// Short display label, e.g. `opus`.
    pub alias: String,
}

impl SdpFormat {
    pub fn new(id: u8, name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// Builds a format from an `a=rtpmap` value such as `96 opus/48000/2`.
    ///
    /// The alias is the lowercased encoding name.
    pub fn from_rtpmap(value: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidRtpmap(value.to_string());

        let (id, encoding) = value.trim().split_once(' ').ok_or_else(invalid)?;
        let id: u8 = id.parse().map_err(|_| invalid())?;
        let encoding = encoding.trim();
        let alias = encoding
            .split('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(invalid)?
            .to_ascii_lowercase();

        Ok(Self::new(id, encoding, alias))
    }
}

/// A negotiated media line with its connection address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpMedia {
    pub kind: MediaKind,
    /// Connection address and media port.
    pub address: SocketAddr,
    /// Declared formats in offer order.
    pub formats: Vec<SdpFormat>,
}

impl SdpMedia {
    pub fn new(kind: MediaKind, address: SocketAddr) -> Self {
        Self {
            kind,
            address,
            formats: Vec::new(),
        }
    }

    pub fn with_format(mut self, format: SdpFormat) -> Self {
        self.formats.push(format);
        self
    }

    /// First declared format with the given id.
    pub fn format(&self, id: u8) -> Option<&SdpFormat> {
        self.formats.iter().find(|format| format.id == id)
    }
}

/// All media lines carried by one signaling message body.
#[derive(Debug, Clone, Default)]
pub struct SdpSession {
    pub medias: Vec<Arc<SdpMedia>>,
}

impl SdpSession {
    pub fn new(medias: Vec<Arc<SdpMedia>>) -> Self {
        Self { medias }
    }

    pub fn media_count(&self) -> usize {
        self.medias.len()
    }

    /// Finds the media line a flow towards `dst` belongs to.
    ///
    /// A media line matches when its address equals `dst`, or when `dst` points
    /// back at the host that sent the signaling message (`msg_src`) on the
    /// media port. The latter covers endpoints announcing a private address.
    pub fn media_for_addr(&self, dst: SocketAddr, msg_src: SocketAddr) -> Option<&Arc<SdpMedia>> {
        self.medias.iter().find(|media| {
            media.address == dst
                || (dst.ip() == msg_src.ip() && dst.port() == media.address.port())
        })
    }

    /// Alias of the first format of the first media line.
    pub fn preferred_codec_alias(&self) -> Option<&str> {
        self.medias
            .first()
            .and_then(|media| media.formats.first())
            .map(|format| format.alias.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn rtpmap_yields_lowercase_alias() {
        let format = SdpFormat::from_rtpmap("96 opus/48000/2").unwrap();
        assert_eq!(format.id, 96);
        assert_eq!(format.name, "opus/48000/2");
        assert_eq!(format.alias, "opus");

        let format = SdpFormat::from_rtpmap("101 telephone-event/8000").unwrap();
        assert_eq!(format.alias, "telephone-event");
    }

    #[test]
    fn rtpmap_rejects_garbage() {
        assert!(matches!(
            SdpFormat::from_rtpmap("opus/48000"),
            Err(CoreError::InvalidRtpmap(_))
        ));
        assert!(SdpFormat::from_rtpmap("300 opus/48000").is_err());
        assert!(SdpFormat::from_rtpmap("96 /8000").is_err());
    }

    #[test]
    fn media_for_addr_matches_exact_address() {
        let audio = Arc::new(SdpMedia::new(MediaKind::Audio, addr("10.0.0.1:4000")));
        let video = Arc::new(SdpMedia::new(MediaKind::Video, addr("10.0.0.1:4002")));
        let sdp = SdpSession::new(vec![audio, video.clone()]);

        let found = sdp
            .media_for_addr(addr("10.0.0.1:4002"), addr("192.168.1.5:5060"))
            .unwrap();
        assert!(Arc::ptr_eq(found, &video));
    }

    #[test]
    fn media_for_addr_matches_signaling_host_on_media_port() {
        // Endpoint announced a private address, media arrives from its public one.
        let audio = Arc::new(SdpMedia::new(MediaKind::Audio, addr("192.168.0.10:4000")));
        let sdp = SdpSession::new(vec![audio.clone()]);

        let found = sdp.media_for_addr(addr("80.1.1.1:4000"), addr("80.1.1.1:5060"));
        assert!(found.is_some_and(|m| Arc::ptr_eq(m, &audio)));

        assert!(sdp
            .media_for_addr(addr("80.1.1.1:4002"), addr("80.1.1.1:5060"))
            .is_none());
    }

    #[test]
    fn preferred_codec_is_first_format_of_first_media() {
        let audio = SdpMedia::new(MediaKind::Audio, addr("10.0.0.1:4000"))
            .with_format(SdpFormat::new(8, "PCMA/8000", "g711a"))
            .with_format(SdpFormat::new(0, "PCMU/8000", "g711u"));
        let sdp = SdpSession::new(vec![Arc::new(audio)]);
        assert_eq!(sdp.preferred_codec_alias(), Some("g711a"));
        assert_eq!(SdpSession::default().preferred_codec_alias(), None);
    }
}
