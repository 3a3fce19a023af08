//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Socket helpers and the receive demultiplexer.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Weak;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::engine::Engine;
use crate::error::TransientError;
use crate::packet::Packet;

/// Receive buffer size for the demultiplexer (a 1 KiB buffer).
const RECV_BUF_LEN: usize = 1024;

/// RFC 5881's well-known BFD single-hop control port, used as the default
/// listen port.
pub const PORT_DST_SINGLE_HOP: u16 = 3784;

/// Connects an outbound datagram socket to `addr`, failing if the dial
/// doesn't complete within one second.
pub(crate) async fn dial(addr: SocketAddrV4) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    tokio::time::timeout(Duration::from_secs(1), socket.connect(addr))
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connect deadline exceeded",
            )
        })??;
    Ok(socket)
}

/// Binds the single wildcard listener used by the demultiplexer.
pub(crate) async fn bind_listener(port: u16) -> std::io::Result<UdpSocket> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await
}

/// Spawns the demultiplexer task.
///
/// A single task owns `socket` for as long as the engine lives. It
/// decodes one datagram at a time and dispatches it to the session whose
/// remote IP matches the packet's `my_discriminator`, silently dropping
/// packets that don't resolve to a known session. Read errors are logged
/// and the loop continues.
///
/// The task holds only a [`Weak`] reference to the engine, not a strong
/// one: a strong `Arc<Engine>` here would keep the engine's own refcount
/// above zero forever, since the only thing that stops this task is the
/// engine's `Drop` impl. Once the last external handle to the engine goes
/// away, the next recv wakes up to a dead upgrade and the task exits on
/// its own; `Drop` aborts it eagerly in the meantime.
pub(crate) fn spawn_demultiplexer(
    socket: UdpSocket,
    engine: Weak<Engine>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; RECV_BUF_LEN];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, _src)) => match Packet::decode(&buf[..len]) {
                    Ok(packet) => {
                        let Some(engine) = engine.upgrade() else {
                            return;
                        };
                        let remote = IpAddr::V4(Ipv4Addr::from(
                            packet.my_discriminator,
                        ));
                        engine.dispatch(remote, packet).await;
                    }
                    Err(source) => {
                        TransientError::Malformed { source }.log();
                    }
                },
                Err(source) => {
                    TransientError::RecvFailed { source }.log();
                }
            }
        }
    })
}

/// Builds the human-readable "ip:port" name used throughout the engine.
pub(crate) fn remote_name(addr: SocketAddr) -> String {
    addr.to_string()
}
