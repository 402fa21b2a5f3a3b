use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::stats::NetworkStats;
use crate::protocol::{Response, Transmission};

pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// The single UDP socket shared by every broadcast and unicast send.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_DATAGRAM_SIZE],
    last_receive_time: Instant,
    running: Arc<AtomicBool>,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_DATAGRAM_SIZE],
            last_receive_time: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    pub fn send_to(&mut self, transmission: &Transmission, addr: SocketAddr) -> io::Result<usize> {
        if transmission.len() > MAX_DATAGRAM_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Transmission exceeds MTU",
            ));
        }

        let bytes = self.socket.send_to(&transmission.buffer, addr)?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;

        Ok(bytes)
    }

    /// Drains every datagram currently queued on the socket. Datagrams that
    /// fail header validation are logged and skipped.
    pub fn receive(&mut self) -> io::Result<Vec<Response>> {
        let mut responses = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => match Response::parse(&self.recv_buffer[..size], addr) {
                    Ok(response) => {
                        self.stats.packets_received += 1;
                        self.stats.bytes_received += size as u64;

                        self.last_receive_time = Instant::now();
                        responses.push(response);
                    }
                    Err(e) => {
                        self.stats.packets_dropped += 1;
                        log::warn!("Discarding datagram from {}: {}", addr, e);
                    }
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(responses)
    }

    pub fn idle_for(&self) -> Duration {
        self.last_receive_time.elapsed()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::protocol::{Flags, MacAddress, encode_frame};

    fn pair() -> (NetworkEndpoint, UdpSocket) {
        let endpoint = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        (endpoint, peer)
    }

    fn drain(endpoint: &mut NetworkEndpoint) -> Vec<Response> {
        for _ in 0..200 {
            let responses = endpoint.receive().unwrap();
            if !responses.is_empty() {
                return responses;
            }
            thread::sleep(Duration::from_millis(5));
        }
        Vec::new()
    }

    #[test]
    fn test_bad_datagram_skipped() {
        let (mut endpoint, peer) = pair();
        let target = endpoint.local_addr();

        peer.send_to(&[0u8; 12], target).unwrap();
        let frame = encode_frame(9, 4, MacAddress([1, 2, 3, 4, 5, 6]), Flags::empty(), 22, &[0, 0]);
        peer.send_to(&frame, target).unwrap();

        let responses = drain(&mut endpoint);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].sequence, 4);
        assert_eq!(responses[0].addr, peer.local_addr().unwrap());
        assert_eq!(endpoint.stats().packets_dropped, 1);
        assert_eq!(endpoint.stats().packets_received, 1);
    }

    #[test]
    fn test_send_counts_bytes() {
        let (mut endpoint, peer) = pair();
        let transmission = Transmission {
            source: 1,
            sequence: 0,
            buffer: encode_frame(1, 0, MacAddress::BROADCAST, Flags::TAGGED, 2, &[]),
            target: MacAddress::BROADCAST,
        };

        let sent = endpoint
            .send_to(&transmission, peer.local_addr().unwrap())
            .unwrap();
        assert_eq!(sent, 36);
        assert_eq!(endpoint.stats().bytes_sent, 36);
        assert_eq!(endpoint.stats().packets_sent, 1);
    }

    #[test]
    fn test_shutdown_flag() {
        let (endpoint, _peer) = pair();
        let running = endpoint.running();
        assert!(endpoint.is_running());
        endpoint.shutdown();
        assert!(!running.load(Ordering::SeqCst));
    }
}
