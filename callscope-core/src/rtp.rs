//! Static RTP payload type assignments (RFC 3551, section 6).
//!
//! Codes missing from this table are dynamic and must be resolved through the
//! negotiated SDP media descriptor.

/// A statically assigned RTP payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpEncoding {
    /// Payload type code.
    pub id: u8,
    /// Encoding name and clock rate as written in an rtpmap attribute.
    pub name: &'static str,
    /// Short display label.
    pub format: &'static str,
}

const fn encoding(id: u8, name: &'static str, format: &'static str) -> RtpEncoding {
    RtpEncoding { id, name, format }
}

static STANDARD_ENCODINGS: &[RtpEncoding] = &[
    encoding(0, "PCMU/8000", "g711u"),
    encoding(3, "GSM/8000", "gsm"),
    encoding(4, "G723/8000", "g723"),
    encoding(5, "DVI4/8000", "dvi"),
    encoding(6, "DVI4/16000", "dvi"),
    encoding(7, "LPC/8000", "lpc"),
    encoding(8, "PCMA/8000", "g711a"),
    encoding(9, "G722/8000", "g722"),
    encoding(10, "L16/44100", "l16"),
    encoding(11, "L16/44100", "l16"),
    encoding(12, "QCELP/8000", "qcelp"),
    encoding(13, "CN/8000", "cn"),
    encoding(14, "MPA/90000", "mpa"),
    encoding(15, "G728/8000", "g728"),
    encoding(16, "DVI4/11025", "dvi"),
    encoding(17, "DVI4/22050", "dvi"),
    encoding(18, "G729/8000", "g729"),
    encoding(25, "CelB/90000", "celb"),
    encoding(26, "JPEG/90000", "jpeg"),
    encoding(28, "nv/90000", "nv"),
    encoding(31, "H261/90000", "h261"),
    encoding(32, "MPV/90000", "mpv"),
    encoding(33, "MP2T/90000", "mp2t"),
    encoding(34, "H263/90000", "h263"),
];

/// Looks up a payload type code in the static table.
pub fn standard_encoding(code: u8) -> Option<&'static RtpEncoding> {
    STANDARD_ENCODINGS.iter().find(|enc| enc.id == code)
}

/// All statically assigned encodings, ordered by code.
pub fn standard_encodings() -> &'static [RtpEncoding] {
    STANDARD_ENCODINGS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_well_known_codes() {
        assert_eq!(standard_encoding(0).map(|e| e.format), Some("g711u"));
        assert_eq!(standard_encoding(8).map(|e| e.name), Some("PCMA/8000"));
        assert_eq!(standard_encoding(18).map(|e| e.format), Some("g729"));
    }

    #[test]
    fn dynamic_and_unassigned_codes_are_absent() {
        assert!(standard_encoding(1).is_none());
        assert!(standard_encoding(96).is_none());
        assert!(standard_encoding(127).is_none());
    }

    #[test]
    fn table_is_sorted_and_unique() {
        let ids: Vec<u8> = standard_encodings().iter().map(|e| e.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
