//! Packet-sending engine
//!
//! This module contains the send side of a run:
//! - Socket abstraction ([`SocketFactory`], [`PacketSink`]) with a tokio UDP implementation
//! - Load-adaptive rate ceiling and per-worker pacing
//! - Payload construction
//! - The worker pool that ties them to the stats aggregator

pub mod payload;
pub mod pool;
pub mod rate;

pub use payload::{PayloadBuilder, HEADER_LEN};
pub use pool::{PoolSettings, ShutdownOutcome, WorkerActivity, WorkerPool};
pub use rate::{RateController, RatePolicy, SlicePacer};

use crate::error::{AppError, Result};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Kernel send/receive buffer requested for every worker socket
pub const SOCKET_BUFFER_SIZE: usize = crate::defaults::MAX_PACKET_SIZE;

/// One worker's socket
#[async_trait]
pub trait PacketSink: Send {
    /// Send one datagram to `target`
    async fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Local address the socket is bound to, when known
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Opens one socket per worker
#[async_trait]
pub trait SocketFactory: Send + Sync {
    async fn open(&self, worker_id: usize, target: SocketAddr) -> Result<Box<dyn PacketSink>>;
}

/// Binds an ephemeral tokio UDP socket in the target's address family,
/// with address reuse and [`SOCKET_BUFFER_SIZE`] kernel buffers
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpSocketFactory;

struct UdpSink {
    socket: UdpSocket,
}

#[async_trait]
impl PacketSink for UdpSink {
    async fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(payload, target).await
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

#[async_trait]
impl SocketFactory for UdpSocketFactory {
    async fn open(&self, worker_id: usize, target: SocketAddr) -> Result<Box<dyn PacketSink>> {
        let bind_addr: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = bind_socket(bind_addr, SOCKET_BUFFER_SIZE)
            .and_then(UdpSocket::from_std)
            .map_err(|e| {
                AppError::socket(format!("Worker {} failed to bind {}: {}", worker_id, bind_addr, e))
            })?;

        Ok(Box::new(UdpSink { socket }))
    }
}

/// Create a nonblocking UDP socket bound to `addr`
pub fn bind_socket(addr: SocketAddr, buffer_size: usize) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    socket.set_send_buffer_size(buffer_size)?;
    socket.set_recv_buffer_size(buffer_size)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_factory_binds_matching_family() {
        let factory = UdpSocketFactory;

        let v4 = factory.open(0, "127.0.0.1:9".parse().unwrap()).await.unwrap();
        assert!(v4.local_addr().unwrap().is_ipv4());

        // IPv6 may be disabled on the host; only check the family when bind works
        if let Ok(v6) = factory.open(1, "[::1]:9".parse().unwrap()).await {
            assert!(v6.local_addr().unwrap().is_ipv6());
        }
    }

    #[test]
    fn test_bind_socket_applies_options() {
        let socket = bind_socket("127.0.0.1:0".parse().unwrap(), SOCKET_BUFFER_SIZE).unwrap();
        let sock = socket2::SockRef::from(&socket);

        assert!(sock.reuse_address().unwrap());
        // Linux reports double the requested size; other kernels may cap it
        assert!(sock.send_buffer_size().unwrap() > 0);
        assert!(sock.recv_buffer_size().unwrap() > 0);
        #[cfg(target_os = "linux")]
        {
            assert!(sock.send_buffer_size().unwrap() >= SOCKET_BUFFER_SIZE);
            assert!(sock.recv_buffer_size().unwrap() >= SOCKET_BUFFER_SIZE);
        }

        // Nonblocking: an empty receive returns immediately
        let mut buf = [0u8; 8];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[tokio::test]
    async fn test_udp_sink_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();

        let mut sink = UdpSocketFactory.open(0, target).await.unwrap();
        let sent = sink.send_to(b"ping", target).await.unwrap();
        assert_eq!(sent, 4);

        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
    }
}
