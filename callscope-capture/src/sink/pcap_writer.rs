use std::path::{Path, PathBuf};

use callscope_core::Packet;
use pcap::{Capture, Linktype, PacketHeader, Savefile};
use tracing::{debug, info};

use super::CaptureSink;
use crate::error::CaptureError;

/// Archives every packet to a pcap file.
pub struct PcapWriterSink {
    name: String,
    savefile: Option<Savefile>,
    written: u64,
}

impl PcapWriterSink {
    pub fn create(path: impl AsRef<Path>, linktype: Linktype) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file_error = |e: pcap::Error| CaptureError::File {
            path: PathBuf::from(path),
            reason: e.to_string(),
        };

        let savefile = Capture::dead(linktype)
            .and_then(|capture| capture.savefile(path))
            .map_err(file_error)?;

        info!(path = %path.display(), "Writing captured packets");
        Ok(Self {
            name: path.display().to_string(),
            savefile: Some(savefile),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl CaptureSink for PcapWriterSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, packet: &Packet) -> Result<(), CaptureError> {
        let Some(savefile) = self.savefile.as_mut() else {
            return Ok(());
        };

        let header = PacketHeader {
            ts: libc::timeval {
                tv_sec: packet.timestamp.timestamp() as libc::time_t,
                tv_usec: packet.timestamp.timestamp_subsec_micros() as libc::suseconds_t,
            },
            caplen: packet.len() as u32,
            len: packet.len() as u32,
        };
        savefile.write(&pcap::Packet::new(&header, &packet.data));
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        if let Some(mut savefile) = self.savefile.take() {
            savefile.flush()?;
            debug!(sink = %self.name, packets = self.written, "Closed capture file");
        }
        Ok(())
    }
}
