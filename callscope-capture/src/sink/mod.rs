//! Capture sinks: consumers every dispatched packet is mirrored to.
//!
//! Sinks run on the capture thread. A slow `write` stalls capture, there is no
//! queue in between.

use callscope_core::Packet;

use crate::error::CaptureError;

mod forwarder;
mod pcap_writer;

pub use forwarder::ForwarderSink;
pub use pcap_writer::PcapWriterSink;

pub trait CaptureSink: Send {
    fn name(&self) -> &str;

    fn write(&mut self, _packet: &Packet) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Flushes and stops accepting packets.
    fn close(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Releases the sink when the manager shuts down.
    fn teardown(&mut self) {}
}
