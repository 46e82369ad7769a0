//! # callscope-core
//!
//! Data types shared across the capture pipeline: captured packets, negotiated
//! SDP media descriptors, the static RTP payload table and the media streams
//! that correlate RTP flows with the signaling exchange that set them up.

pub mod error;
pub mod packet;
pub mod rtp;
pub mod sdp;
pub mod stream;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::packet::*;
    pub use crate::sdp::*;
    pub use crate::stream::*;
    pub use crate::time::*;
}

pub use error::CoreError;
pub use packet::Packet;
pub use stream::{ExchangeId, MediaStream, StreamKind, STREAM_INACTIVE_THRESHOLD};
