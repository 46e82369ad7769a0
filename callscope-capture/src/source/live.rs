use pcap::{Active, Capture, Device, Linktype};
use tracing::{debug, info};

use super::{filter_error, from_pcap, CaptureMode, CaptureSource, SourceContext, SourcePoll};
use crate::error::CaptureError;

/// Live capture on a network device.
///
/// The handle is non-blocking so a quiet device never stalls the loop.
pub struct LiveSource {
    name: String,
    capture: Capture<Active>,
    linktype: Linktype,
}

impl LiveSource {
    pub fn open(
        interface: &str,
        snaplen: usize,
        promiscuous: bool,
        timeout_ms: u32,
    ) -> Result<Self, CaptureError> {
        let device = Device::list()?
            .into_iter()
            .find(|d| d.name == interface)
            .ok_or_else(|| CaptureError::DeviceNotFound(interface.to_string()))?;

        let capture = Capture::from_device(device)?
            .promisc(promiscuous)
            .snaplen(snaplen as i32)
            .timeout(timeout_ms as i32)
            .open()?
            .setnonblock()?;

        let linktype = capture.get_datalink();
        info!(interface, snaplen, promiscuous, ?linktype, "Opened live capture");
        Ok(Self {
            name: interface.to_string(),
            capture,
            linktype,
        })
    }

    pub fn linktype(&self) -> Linktype {
        self.linktype
    }
}

impl CaptureSource for LiveSource {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Live
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self, _ctx: &SourceContext<'_>) -> Result<SourcePoll, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(SourcePoll::Packet(from_pcap(packet, self.linktype))),
            Err(pcap::Error::TimeoutExpired) => Ok(SourcePoll::Idle),
            Err(e) => Err(e.into()),
        }
    }

    fn apply_filter(&mut self, filter: &str) -> Result<(), CaptureError> {
        self.capture
            .filter(filter, true)
            .map_err(|e| filter_error(&self.name, e))?;
        debug!(source = %self.name, filter, "Applied capture filter");
        Ok(())
    }

    fn teardown(&mut self) {
        match self.capture.stats() {
            Ok(stats) => info!(
                source = %self.name,
                received = stats.received,
                dropped = stats.dropped,
                "Closing live capture"
            ),
            Err(e) => debug!(source = %self.name, "No capture stats: {e}"),
        }
    }
}
