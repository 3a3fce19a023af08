//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The session ticker: a single supervision task
//! per session multiplexing the Tx tick, the Rx-timeout tick, and the
//! shutdown signal. The loop owns no locks; every branch only calls into
//! [`Session`] methods that take and release the session's own lock.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::TransientError;
use crate::session::Session;

/// Spawns the ticker task for a freshly admitted session.
///
/// Returns a handle the engine can drop to detach from (not cancel) the
/// task -- the task's own lifetime is governed by the shutdown signal, not
/// by this handle.
pub(crate) fn spawn(
    session: Arc<Session>,
    shutdown: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(run(session, shutdown))
}

async fn run(session: Arc<Session>, mut shutdown: oneshot::Receiver<()>) {
    let mut tx_interval = tokio::time::interval(
        std::time::Duration::from_micros(session.desired_min_tx_us as u64),
    );
    let mut rx_interval =
        tokio::time::interval(crate::session::RX_CHECK_INTERVAL);
    // The first tick of a freshly created interval fires immediately;
    // skip it so the session doesn't transmit before it's fully admitted.
    tx_interval.tick().await;
    rx_interval.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                return;
            }
            _ = tx_interval.tick() => {
                if let Err(source) = session.send_current().await {
                    TransientError::SendFailed { source }.log();
                }
            }
            _ = rx_interval.tick() => {
                if let Some(role) = session.check_timeout().await {
                    session.notify(role);
                }
            }
        }
    }
}
