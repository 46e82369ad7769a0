use std::net::{SocketAddr, UdpSocket};

use callscope_core::Packet;
use tracing::{debug, info};

use super::CaptureSink;
use crate::error::CaptureError;

/// Relays every packet's bytes to a remote collector over UDP.
pub struct ForwarderSink {
    name: String,
    socket: UdpSocket,
    destination: SocketAddr,
    sent: u64,
    closed: bool,
}

impl ForwarderSink {
    pub fn connect(destination: SocketAddr) -> Result<Self, CaptureError> {
        let bind: SocketAddr = if destination.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;

        info!(%destination, "Forwarding captured packets");
        Ok(Self {
            name: format!("udp:{destination}"),
            socket,
            destination,
            sent: 0,
            closed: false,
        })
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl CaptureSink for ForwarderSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, packet: &Packet) -> Result<(), CaptureError> {
        if self.closed {
            return Ok(());
        }
        self.socket.send_to(&packet.data, self.destination)?;
        self.sent += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.closed = true;
        debug!(sink = %self.name, packets = self.sent, "Stopped forwarding");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn forwards_payload_until_closed() {
        let collector = UdpSocket::bind("127.0.0.1:0").unwrap();
        collector
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let mut sink = ForwarderSink::connect(collector.local_addr().unwrap()).unwrap();
        sink.write(&Packet::new(Utc::now(), b"BYE".to_vec())).unwrap();

        let mut buf = [0u8; 16];
        let (len, _) = collector.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"BYE");

        sink.close().unwrap();
        sink.write(&Packet::new(Utc::now(), b"late".to_vec())).unwrap();
        assert_eq!(sink.sent(), 1);
    }
}
