//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex as AsyncMutex, RwLock};

use crate::debug::Debug;
use crate::notify::{Notifier, Role};
use crate::packet::{Packet, SessionState};

/// Floor on `desired_min_tx_us`.
pub const MIN_TX_INTERVAL_US: u32 = 100_000;
/// Floor on `required_min_rx_us`.
pub const MIN_RX_INTERVAL_US: u32 = 200_000;
/// Fixed cadence of the Rx ticker's timeout check.
pub const RX_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// One per-peer BFD session.
///
/// Every mutable field lives behind a single read/write lock
/// (`SessionInner`), taken only around the short critical sections of state
/// transition and timeout check -- never across socket I/O.
pub struct Session {
    pub remote_name: String,
    pub instance: String,
    pub(crate) connection: Arc<UdpSocket>,
    inner: RwLock<SessionInner>,

    pub(crate) my_discriminator: u32,
    pub(crate) my_multiplier: u8,
    pub(crate) desired_min_tx_us: u32,
    pub(crate) required_min_rx_us: u32,
    pub(crate) required_min_echo_us: u32,

    notifier: Arc<dyn Notifier>,
    /// The 24-byte transmit scratch buffer, reused across
    /// sends rather than reallocated on every tick.
    tx_buffer: AsyncMutex<BytesMut>,
    /// Edge-triggered shutdown signal, consumed exactly once by the
    /// session's ticker task.
    shutdown: std::sync::Mutex<Option<oneshot::Sender<()>>>,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    remote_multiplier: u8,
    remote_discriminator: u32,
    remote_desired_min_tx_us: u32,
    detect_timeout_us: u32,
    last_rx_timestamp: Option<Instant>,
    /// Wall-clock time of the most recent transition into `Up`, cleared on
    /// every transition out of it. Exposed for diagnostics; timeout math
    /// is computed from `last_rx_timestamp`'s monotonic clock, never this.
    up_since: Option<DateTime<Utc>>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        remote_name: String,
        instance: String,
        connection: UdpSocket,
        my_discriminator: u32,
        my_multiplier: u8,
        desired_min_tx_us: u32,
        required_min_rx_us: u32,
        required_min_echo_us: u32,
        notifier: Arc<dyn Notifier>,
    ) -> (Session, oneshot::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let session = Session {
            remote_name,
            instance,
            connection: Arc::new(connection),
            inner: RwLock::new(SessionInner {
                state: SessionState::Down,
                remote_multiplier: 0,
                remote_discriminator: 0,
                remote_desired_min_tx_us: 0,
                detect_timeout_us: 0,
                last_rx_timestamp: None,
                up_since: None,
            }),
            my_discriminator,
            my_multiplier,
            desired_min_tx_us,
            required_min_rx_us,
            required_min_echo_us,
            notifier,
            tx_buffer: AsyncMutex::new(BytesMut::with_capacity(
                Packet::LENGTH as usize,
            )),
            shutdown: std::sync::Mutex::new(Some(shutdown_tx)),
        };
        (session, shutdown_rx)
    }

    /// Returns the session's current state.
    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    /// Returns the wall-clock time this session last transitioned into
    /// `Up`, or `None` if it isn't currently `Up`.
    pub async fn up_since(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.up_since
    }

    /// Raises the session's shutdown signal. A no-op if it was already
    /// raised (re-delivery must not occur per the ticker's contract, but
    /// this makes `Drop` safe regardless).
    pub(crate) fn shutdown(&self) {
        if let Some(tx) = self.shutdown.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }

    /// Builds the packet this session would transmit right now, reflecting
    /// its current local state.
    async fn generate_packet(&self) -> Packet {
        let inner = self.inner.read().await;
        Packet {
            version: Packet::VERSION,
            state: inner.state,
            detect_multiplier: self.my_multiplier,
            length: Packet::LENGTH,
            my_discriminator: self.my_discriminator,
            your_discriminator: inner.remote_discriminator,
            desired_min_tx_interval_us: self.desired_min_tx_us,
            required_min_rx_interval_us: self.required_min_rx_us,
            required_min_echo_interval_us: self.required_min_echo_us,
        }
    }

    /// Encodes and sends the packet the session would currently transmit.
    /// Called by the ticker's Tx-tick branch.
    pub(crate) async fn send_current(&self) -> std::io::Result<()> {
        let packet = self.generate_packet().await;
        self.send(&packet).await
    }

    /// Sends a single packet carrying `AdminDown`, used both when the
    /// remote reports `AdminDown` is not applicable here (that's an Rx
    /// event) and when this session is deleted: sent before the socket is
    /// torn down, never raced against close.
    pub(crate) async fn send_admin_down(&self) -> std::io::Result<()> {
        let mut packet = self.generate_packet().await;
        packet.state = SessionState::AdminDown;
        self.send(&packet).await
    }

    async fn send(&self, packet: &Packet) -> std::io::Result<()> {
        let mut buf = self.tx_buffer.lock().await;
        packet.encode_into(&mut buf);
        tokio::time::timeout(
            Duration::from_millis(500),
            self.connection.send(&buf),
        )
        .await
        .unwrap_or_else(|_| {
            Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "send deadline exceeded",
            ))
        })
        .map(|_| ())
    }

    /// Applies a received control packet to the session's state machine.
    /// Returns the role to notify with, if the transition actually
    /// changed the local state.
    pub(crate) async fn apply_packet(&self, pkt: &Packet) -> Option<Role> {
        let mut inner = self.inner.write().await;

        inner.remote_multiplier = pkt.detect_multiplier;
        inner.remote_discriminator = pkt.my_discriminator;
        inner.remote_desired_min_tx_us = pkt.desired_min_tx_interval_us;
        inner.detect_timeout_us = inner.remote_multiplier as u32
            * std::cmp::max(
                inner.remote_desired_min_tx_us,
                self.required_min_rx_us,
            );
        inner.last_rx_timestamp = Some(Instant::now());

        let old_state = inner.state;
        let new_state = match pkt.state {
            SessionState::Down => {
                if old_state == SessionState::Down {
                    SessionState::Init
                } else {
                    old_state
                }
            }
            SessionState::Init => {
                if old_state != SessionState::Up {
                    SessionState::Up
                } else {
                    old_state
                }
            }
            SessionState::AdminDown => SessionState::AdminDown,
            SessionState::Up => {
                if old_state != SessionState::Up {
                    SessionState::Up
                } else {
                    old_state
                }
            }
        };

        self.transition(&mut inner, old_state, new_state)
    }

    /// Called by the ticker on every Rx-timeout tick: declares the session
    /// `Down` if it has been silent for longer than its negotiated
    /// detection time.
    pub(crate) async fn check_timeout(&self) -> Option<Role> {
        let mut inner = self.inner.write().await;

        let old_state = inner.state;
        if old_state != SessionState::Up {
            return None;
        }
        let Some(last_rx) = inner.last_rx_timestamp else {
            return None;
        };
        if last_rx.elapsed() <= Duration::from_micros(inner.detect_timeout_us as u64) {
            return None;
        }

        Debug::DetectionTimeExpiry(&self.remote_name).log();
        self.transition(&mut inner, old_state, SessionState::Down)
    }

    /// Administratively forces the session down, used by `Engine::delete`.
    /// Unconditional, matching the `AdminDown` row of the transition table.
    pub(crate) async fn force_admin_down(&self) -> Option<Role> {
        let mut inner = self.inner.write().await;
        let old_state = inner.state;
        self.transition(&mut inner, old_state, SessionState::AdminDown)
    }

    /// Applies the notification rule for a transition from
    /// `old_state` to `inner.state == new_state`, returning the role to
    /// notify with iff the state actually changed.
    fn transition(
        &self,
        inner: &mut SessionInner,
        old_state: SessionState,
        new_state: SessionState,
    ) -> Option<Role> {
        if new_state == old_state {
            return None;
        }
        inner.state = new_state;
        inner.up_since = (new_state == SessionState::Up).then(Utc::now);

        Debug::FsmTransition(&self.remote_name, old_state, new_state).log();

        let role = match (old_state, new_state) {
            (_, SessionState::Up) => {
                if self.my_discriminator > inner.remote_discriminator {
                    Role::Master
                } else {
                    Role::Backup
                }
            }
            (SessionState::Up, SessionState::Down) => Role::Master,
            _ => Role::NotDefined,
        };

        Some(role)
    }

    /// Invokes the notifier capability outside of any lock.
    pub(crate) fn notify(&self, role: Role) {
        self.notifier
            .bfd_session_notify(&self.instance, &self.remote_name, role);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        Debug::SessionDelete(&self.remote_name).log();
    }
}
