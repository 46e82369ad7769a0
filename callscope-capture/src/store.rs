//! Seam to the session store.

use std::sync::Arc;

use callscope_core::Packet;

/// Consumer of every captured packet, responsible for rebuilding signaling
/// dialogs and the media streams they negotiate.
///
/// The store owns every `MediaStream` it creates; the capture manager only
/// hands it packets, always from the capture thread.
pub trait SessionStore: Send + Sync {
    fn process_packet(&self, packet: Arc<Packet>);
}
