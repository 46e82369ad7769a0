use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use callscope_core::Packet;
use chrono::Utc;
use tracing::info;

use super::{CaptureMode, CaptureSource, SourceContext, SourcePoll};
use crate::error::CaptureError;

const MAX_DATAGRAM: usize = 65_535;

/// Receives packets mirrored to a UDP socket by a remote capture agent.
///
/// Each datagram becomes one packet whose endpoints are the sending agent and
/// the local socket. Listeners count as online sources.
pub struct ListenerSource {
    name: String,
    socket: UdpSocket,
    local: SocketAddr,
    buffer: Vec<u8>,
}

impl ListenerSource {
    pub fn bind(addr: SocketAddr) -> Result<Self, CaptureError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local = socket.local_addr()?;

        info!(%local, "Listening for mirrored packets");
        Ok(Self {
            name: format!("udp:{local}"),
            socket,
            local,
            buffer: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

impl CaptureSource for ListenerSource {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Listener
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self, _ctx: &SourceContext<'_>) -> Result<SourcePoll, CaptureError> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, peer)) => {
                let packet = Packet::new(Utc::now(), self.buffer[..len].to_vec())
                    .with_endpoints(peer, self.local);
                Ok(SourcePoll::Packet(packet))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(SourcePoll::Idle),
            Err(e) => Err(e.into()),
        }
    }
}
