//! UDP stand-in for the pub/sub broker: one datagram per message, one address per channel.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use camlink_core::{Channel, Publisher, TransportSendError};
use log::{error, warn};
use tokio::net::UdpSocket;

use crate::dispatcher::Dispatcher;

/// Largest UDP payload over IPv4.
pub const MAX_MESSAGE_LEN: usize = 65_507;

/// Publishes each channel's messages to a fixed UDP destination.
pub struct UdpPublisher {
    socket: std::net::UdpSocket,
    routes: HashMap<Channel, SocketAddr>,
}

impl UdpPublisher {
    /// Bind an ephemeral non-blocking socket. A send that would block fails instead of stalling.
    pub fn bind(local: SocketAddr, routes: HashMap<Channel, SocketAddr>) -> std::io::Result<Self> {
        let socket = std::net::UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, routes })
    }
}

impl Publisher for UdpPublisher {
    fn publish(&self, channel: Channel, message: &[u8]) -> Result<(), TransportSendError> {
        let dest = self
            .routes
            .get(&channel)
            .ok_or(TransportSendError::NotConfigured(channel))?;
        if message.len() > MAX_MESSAGE_LEN {
            return Err(TransportSendError::TooLarge {
                len: message.len(),
                limit: MAX_MESSAGE_LEN,
            });
        }
        self.socket.send_to(message, dest)?;
        Ok(())
    }
}

/// Receive image frames and hand each to the dispatcher. Never awaits completion work.
pub async fn run_frame_receiver(
    socket: UdpSocket,
    dispatcher: Arc<Dispatcher>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; 65536];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, _from)) => {
                dispatcher.on_frame(&buf[..n]);
            }
            Err(e) => {
                error!("frame socket receive failed: {}", e);
                return Err(e);
            }
        }
    }
}

/// Receive the peer's latency statistics records.
pub async fn run_stats_receiver(
    socket: UdpSocket,
    dispatcher: Arc<Dispatcher>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; 4096];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, from)) => {
                if n == buf.len() {
                    warn!("statistics datagram from {} truncated", from);
                }
                dispatcher.on_stats(&buf[..n]);
            }
            Err(e) => {
                error!("statistics socket receive failed: {}", e);
                return Err(e);
            }
        }
    }
}
