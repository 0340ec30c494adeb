use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::protocol::MAX_PACKET_SIZE;
use super::stats::{NetworkStats, PacketLossSimulation};

/// Largest datagram a transport is asked to carry: a maximum-size payload
/// plus endpoint framing.
pub const MAX_DATAGRAM_SIZE: usize = MAX_PACKET_SIZE + 64;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Nothing to read, or the socket would block; retry on the next poll.
    #[error("transport busy")]
    Busy,
    #[error("transport closed")]
    Closed,
    #[error("transport i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Datagram socket as seen by the managers.
pub trait Transport {
    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError>;

    fn receive_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError>;

    /// Size of the next pending datagram, or 0 when nothing is queued.
    fn available_bytes(&self) -> usize;

    fn local_addr(&self) -> Result<SocketAddr, TransportError>;

    fn close(&mut self);

    fn is_closed(&self) -> bool;

    fn stats(&self) -> &NetworkStats;
}

pub struct UdpTransport {
    socket: Option<UdpSocket>,
    loss: PacketLossSimulation,
    stats: NetworkStats,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        log::debug!("udp transport bound to {}", socket.local_addr()?);

        Ok(Self {
            socket: Some(socket),
            loss: PacketLossSimulation::default(),
            stats: NetworkStats::default(),
        })
    }

    pub fn set_packet_loss(&mut self, loss: PacketLossSimulation) {
        self.loss = loss;
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::Closed)
    }
}

impl Transport for UdpTransport {
    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            self.stats.packets_too_large += 1;
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "datagram exceeds MTU").into());
        }
        let socket = self.socket()?;
        if self.loss.should_drop() {
            log::debug!("simulated loss of {} bytes to {}", bytes.len(), addr);
            self.stats.packets_sent += 1;
            return Ok(());
        }

        match socket.send_to(bytes, addr) {
            Ok(sent) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += sent as u64;
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Err(TransportError::Busy),
            Err(e) => Err(e.into()),
        }
    }

    fn receive_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        loop {
            match self.socket()?.recv_from(buf) {
                Ok((size, addr)) => {
                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;
                    return Ok((size, addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(TransportError::Busy);
                }
                // ICMP unreachable from an earlier send; not about this read.
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn available_bytes(&self) -> usize {
        let Ok(socket) = self.socket() else {
            return 0;
        };
        let mut peek = [0u8; MAX_DATAGRAM_SIZE];
        match socket.peek_from(&mut peek) {
            Ok((size, _)) => size,
            Err(_) => 0,
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket()?.local_addr()?)
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            log::debug!("udp transport {:?} closed", socket.local_addr().ok());
        }
    }

    fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_send_and_receive() {
        let mut a = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut b = UdpTransport::bind("127.0.0.1:0").unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(&[1, 2, 3], b_addr).unwrap();

        let mut buf = [0u8; 16];
        let start = std::time::Instant::now();
        let received = loop {
            match b.receive_from(&mut buf) {
                Ok(received) => break received,
                Err(TransportError::Busy) if start.elapsed().as_millis() < 500 => {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(e) => panic!("receive failed: {e}"),
            }
        };

        assert_eq!(&buf[..received.0], &[1, 2, 3]);
        assert_eq!(received.1, a.local_addr().unwrap());
        assert_eq!(a.stats().packets_sent, 1);
    }

    #[test]
    fn test_empty_socket_is_busy() {
        let mut transport = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut buf = [0u8; 16];
        assert!(matches!(transport.receive_from(&mut buf), Err(TransportError::Busy)));
        assert_eq!(transport.available_bytes(), 0);
    }

    #[test]
    fn test_closed_transport_rejects_io() {
        let mut transport = UdpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr().unwrap();
        transport.close();
        assert!(transport.is_closed());
        assert!(matches!(transport.send_to(&[1], addr), Err(TransportError::Closed)));
    }
}
