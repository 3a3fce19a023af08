//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The engine registry: admission, deletion, and
//! dispatch of packets to sessions.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use derive_new::new;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::debug::Debug;
use crate::discriminator::derive_local_discriminator;
use crate::error::{Error, TransientError};
use crate::notify::Notifier;
use crate::packet::Packet;
use crate::session::{Session, MIN_TX_INTERVAL_US};
use crate::{network, ticker};

/// A registered session plus the handle of its ticker task.
#[derive(new)]
struct SessionEntry {
    session: Arc<Session>,
    ticker: JoinHandle<()>,
}

/// Process-wide registry of BFD sessions.
///
/// The map is guarded by a single read/write lock: dispatch on the hot
/// receive path takes a shared lease, admission and deletion take an
/// exclusive one. No lock is held across I/O or across calls into a
/// session's notifier.
pub struct Engine {
    sessions: RwLock<HashMap<IpAddr, SessionEntry>>,
    config: EngineConfig,
    listener: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Binds the demultiplexer's wildcard listener and starts the engine.
    pub async fn new(config: EngineConfig) -> std::io::Result<Arc<Engine>> {
        let socket = network::bind_listener(config.listen_port).await?;
        let engine = Arc::new(Engine {
            sessions: RwLock::new(HashMap::new()),
            config,
            listener: std::sync::Mutex::new(None),
        });
        let handle =
            network::spawn_demultiplexer(socket, Arc::downgrade(&engine));
        *engine.listener.lock().unwrap() = Some(handle);
        Ok(engine)
    }

    /// Admits a new session for `remote_ip`.
    pub async fn admit(
        &self,
        remote_ip: &str,
        port: u16,
        tx_interval_us: u32,
        detect_multiplier: u8,
        instance: impl Into<String>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(), Error> {
        if tx_interval_us < MIN_TX_INTERVAL_US {
            return Err(Error::AdmissionArgs {
                reason: "desired_min_tx_us below the 100ms floor",
            });
        }
        if detect_multiplier == 0 {
            return Err(Error::AdmissionArgs {
                reason: "detect_multiplier must be at least 1",
            });
        }

        let ip: Ipv4Addr =
            remote_ip.parse().map_err(|_| Error::AdmissionAddress {
                reason: format!("malformed IPv4 address: {remote_ip}"),
            })?;
        let key = IpAddr::V4(ip);

        {
            let sessions = self.sessions.read().await;
            if sessions.contains_key(&key) {
                return Err(Error::AdmissionConflict {
                    remote_ip: remote_ip.to_owned(),
                });
            }
        }

        let my_discriminator = derive_local_discriminator(ip)?;
        let sockaddr = SocketAddrV4::new(ip, port);
        let connection = network::dial(sockaddr)
            .await
            .map_err(|source| Error::AdmissionConnect { source })?;
        let remote_name = network::remote_name(SocketAddr::V4(sockaddr));

        let (session, shutdown_rx) = Session::new(
            remote_name,
            instance.into(),
            connection,
            my_discriminator,
            detect_multiplier,
            tx_interval_us,
            self.config.required_min_rx_interval_us,
            tx_interval_us,
            notifier,
        );
        let session = Arc::new(session);
        let ticker_handle = ticker::spawn(session.clone(), shutdown_rx);

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&key) {
            // Lost a race against a concurrent admission of the same peer.
            session.shutdown();
            return Err(Error::AdmissionConflict {
                remote_ip: remote_ip.to_owned(),
            });
        }
        Debug::SessionCreate(&session.remote_name).log();
        sessions.insert(key, SessionEntry::new(session, ticker_handle));
        Ok(())
    }

    /// Deletes the session for `remote_ip`.
    pub async fn delete(
        &self,
        remote_ip: &str,
        _port: u16,
    ) -> Result<(), Error> {
        let key: IpAddr = match remote_ip.parse::<Ipv4Addr>() {
            Ok(ip) => IpAddr::V4(ip),
            Err(_) => {
                return Err(Error::NotFound {
                    remote_ip: remote_ip.to_owned(),
                });
            }
        };

        let entry = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(&key)
        };
        let Some(entry) = entry else {
            return Err(Error::NotFound {
                remote_ip: remote_ip.to_owned(),
            });
        };

        if let Some(role) = entry.session.force_admin_down().await {
            entry.session.notify(role);
        }
        // Stop the ticker before sending the final packet ourselves, so
        // the send below is never racing a concurrent Tx tick for the
        // same socket.
        entry.session.shutdown();
        if let Err(source) = entry.session.send_admin_down().await {
            TransientError::SendFailed { source }.log();
        }
        let _ = entry.ticker.await;

        Ok(())
    }

    /// Dispatches a decoded packet to the session matching its sender's
    /// discriminator. Unmatched packets are silently dropped.
    pub(crate) async fn dispatch(&self, remote: IpAddr, packet: Packet) {
        let session = {
            let sessions = self.sessions.read().await;
            match sessions.get(&remote) {
                Some(entry) => entry.session.clone(),
                None => {
                    TransientError::NoMatchingSession {
                        my_discriminator: packet.my_discriminator,
                    }
                    .log();
                    return;
                }
            }
        };

        // The engine lock is released before touching the session, so
        // the state-machine update and the notifier call below never run
        // with the registry lock held.
        if let Some(role) = session.apply_packet(&packet).await {
            session.notify(role);
        }
    }

    /// Returns the current state of the session for `remote_ip`, if any.
    pub async fn session_state(
        &self,
        remote_ip: &str,
    ) -> Option<crate::packet::SessionState> {
        let ip: Ipv4Addr = remote_ip.parse().ok()?;
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&IpAddr::V4(ip))?;
        Some(entry.session.state().await)
    }

    /// Returns when the session for `remote_ip` last came `Up`, if it's
    /// currently in that state.
    pub async fn session_up_since(
        &self,
        remote_ip: &str,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        let ip: Ipv4Addr = remote_ip.parse().ok()?;
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&IpAddr::V4(ip))?;
        entry.session.up_since().await
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.lock().unwrap().take() {
            handle.abort();
        }
        // Every session's ticker task holds its own `Arc<Session>`, so it
        // would otherwise keep transmitting long after the engine that
        // admitted it is gone. Raise each shutdown signal so they all
        // stop promptly instead of leaking.
        if let Ok(sessions) = self.sessions.try_read() {
            for entry in sessions.values() {
                entry.session.shutdown();
            }
        }
    }
}
