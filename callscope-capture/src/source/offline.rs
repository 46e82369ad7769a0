use std::path::{Path, PathBuf};

use pcap::{Capture, Linktype, Offline};
use tracing::{debug, info};

use super::{filter_error, from_pcap, CaptureMode, CaptureSource, SourceContext, SourcePoll};
use crate::error::CaptureError;

/// Replays packets from a pcap file.
///
/// While the manager is paused the file position is held, nothing is skipped.
pub struct OfflineSource {
    name: String,
    path: PathBuf,
    capture: Capture<Offline>,
    linktype: Linktype,
    read: u64,
}

impl OfflineSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let capture = Capture::from_file(path).map_err(|e| CaptureError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let linktype = capture.get_datalink();
        info!(path = %path.display(), ?linktype, "Opened capture file");
        Ok(Self {
            name: path.display().to_string(),
            path: path.to_path_buf(),
            capture,
            linktype,
            read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn linktype(&self) -> Linktype {
        self.linktype
    }
}

impl CaptureSource for OfflineSource {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Offline
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self, ctx: &SourceContext<'_>) -> Result<SourcePoll, CaptureError> {
        if ctx.paused {
            return Ok(SourcePoll::Idle);
        }

        match self.capture.next_packet() {
            Ok(packet) => {
                self.read += 1;
                Ok(SourcePoll::Packet(from_pcap(packet, self.linktype)))
            }
            Err(pcap::Error::NoMorePackets) => {
                info!(source = %self.name, packets = self.read, "Finished reading capture file");
                Ok(SourcePoll::Finished)
            }
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
}
