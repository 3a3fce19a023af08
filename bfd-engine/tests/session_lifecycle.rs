//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! End-to-end exercises of the engine against real loopback UDP sockets:
//! no mocked transport, each test drives one or two independently admitted
//! sessions to completion.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bfd_engine::{Engine, EngineConfig, Error, Notifier, Role, SessionState};
use tokio::sync::Mutex;

/// Hands out distinct loopback ports to each test so parallel `cargo test`
/// runs never contend for the same listener.
static NEXT_PORT: AtomicU16 = AtomicU16::new(31000);

fn next_port() -> u16 {
    NEXT_PORT.fetch_add(2, Ordering::Relaxed)
}

/// Routes the engine's `tracing` output through the test harness's own
/// writer so a failing test shows its debug spans instead of swallowing
/// them. Safe to call from every test; only the first call wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("bfd_engine=debug")
        .try_init();
}

async fn engine_on_port(port: u16) -> Arc<Engine> {
    Engine::new(EngineConfig {
        listen_port: port,
        required_min_rx_interval_us: 200_000,
    })
    .await
    .unwrap()
}

/// Records every notification delivered, in order.
#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<(String, Role)>>,
}

impl Notifier for RecordingNotifier {
    fn bfd_session_notify(&self, _instance: &str, remote: &str, role: Role) {
        // bfd_session_notify is a sync fn invoked from inside the engine's
        // own async tasks; blocking_lock would deadlock a single-threaded
        // runtime, so fall back to try_lock and drop the rare contended
        // call rather than block the caller.
        if let Ok(mut calls) = self.calls.try_lock() {
            calls.push((remote.to_owned(), role));
        }
    }
}

impl RecordingNotifier {
    async fn wait_for(
        &self,
        role: Role,
        timeout: Duration,
    ) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some((remote, _)) = self
                .calls
                .lock()
                .await
                .iter()
                .rev()
                .find(|(_, seen)| *seen == role)
            {
                return Some(remote.clone());
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[tokio::test]
async fn handshake_brings_both_sides_up_with_opposite_roles() {
    init_tracing();
    let port_a = next_port();
    let port_b = next_port();
    let a = engine_on_port(port_a).await;
    let b = engine_on_port(port_b).await;

    let notifier_a = Arc::new(RecordingNotifier::default());
    let notifier_b = Arc::new(RecordingNotifier::default());

    a.admit("127.0.0.1", port_b, 100_000, 3, "test", notifier_a.clone())
        .await
        .unwrap();
    b.admit("127.0.0.1", port_a, 100_000, 3, "test", notifier_b.clone())
        .await
        .unwrap();

    let up_timeout = Duration::from_secs(5);
    assert!(
        tokio::time::timeout(up_timeout, async {
            loop {
                if a.session_state("127.0.0.1").await == Some(SessionState::Up)
                    && b.session_state("127.0.0.1").await
                        == Some(SessionState::Up)
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .is_ok(),
        "both sessions should reach Up"
    );

    // Both sides notify exactly once on the way up, with opposite roles:
    // the side with the higher discriminator is MASTER.
    let role_a = notifier_a
        .wait_for(Role::Master, Duration::from_millis(100))
        .await
        .is_some();
    let role_b = notifier_b
        .wait_for(Role::Master, Duration::from_millis(100))
        .await
        .is_some();
    assert_ne!(role_a, role_b, "exactly one side should be MASTER");
}

#[tokio::test]
async fn session_times_out_after_peer_goes_silent() {
    init_tracing();
    let port_a = next_port();
    let port_b = next_port();
    let a = engine_on_port(port_a).await;
    let b = engine_on_port(port_b).await;

    let notifier_a = Arc::new(RecordingNotifier::default());
    let notifier_b = Arc::new(RecordingNotifier::default());

    a.admit("127.0.0.1", port_b, 100_000, 3, "test", notifier_a.clone())
        .await
        .unwrap();
    b.admit("127.0.0.1", port_a, 100_000, 3, "test", notifier_b.clone())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while a.session_state("127.0.0.1").await != Some(SessionState::Up) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("session should reach Up before the timeout test begins");

    // Drop b's engine entirely: its listener and tickers stop, so a never
    // hears from it again and must declare the session Down on its own.
    drop(b);

    let timed_out = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if a.session_state("127.0.0.1").await == Some(SessionState::Down)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok();
    assert!(timed_out, "session should time out to Down");

    let remote = notifier_a
        .wait_for(Role::Master, Duration::from_millis(100))
        .await;
    assert!(
        remote.is_some(),
        "losing Up must notify MASTER"
    );
}

#[tokio::test]
async fn delete_sends_a_single_admin_down_and_forgets_the_session() {
    init_tracing();
    let port_a = next_port();
    let port_b = next_port();
    let a = engine_on_port(port_a).await;
    let b = engine_on_port(port_b).await;

    let notifier_a = Arc::new(RecordingNotifier::default());
    let notifier_b = Arc::new(RecordingNotifier::default());

    a.admit("127.0.0.1", port_b, 100_000, 3, "test", notifier_a.clone())
        .await
        .unwrap();
    b.admit("127.0.0.1", port_a, 100_000, 3, "test", notifier_b.clone())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while b.session_state("127.0.0.1").await != Some(SessionState::Up) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("session should reach Up before deletion");

    a.delete("127.0.0.1", port_b).await.unwrap();

    // b must observe AdminDown shortly after a's delete, carried by the
    // single final packet a sends before tearing its socket down.
    let saw_admin_down = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if b.session_state("127.0.0.1").await
                == Some(SessionState::AdminDown)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok();
    assert!(saw_admin_down);

    // The deleted session is gone, not merely reset: a second delete is a
    // NotFound, not a silent no-op.
    let err = a.delete("127.0.0.1", port_b).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(a.session_state("127.0.0.1").await, None);
}

#[tokio::test]
async fn duplicate_admission_is_rejected_and_leaves_the_first_session_intact()
{
    init_tracing();
    let port_a = next_port();
    let port_b = next_port();
    let a = engine_on_port(port_a).await;
    let notifier = Arc::new(RecordingNotifier::default());

    a.admit("127.0.0.1", port_b, 100_000, 3, "test", notifier.clone())
        .await
        .unwrap();

    let err = a
        .admit("127.0.0.1", port_b, 100_000, 3, "test", notifier.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AdmissionConflict { .. }));

    // The original session must still be registered and running.
    assert_eq!(a.session_state("127.0.0.1").await, Some(SessionState::Down));
}

#[tokio::test]
async fn malformed_admission_arguments_are_rejected_before_any_socket_work() {
    init_tracing();
    let port_a = next_port();
    let a = engine_on_port(port_a).await;
    let notifier = Arc::new(RecordingNotifier::default());

    let err = a
        .admit("127.0.0.1", 3784, 50_000, 3, "test", notifier.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AdmissionArgs { .. }));

    let err = a
        .admit("127.0.0.1", 3784, 100_000, 0, "test", notifier.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AdmissionArgs { .. }));

    let err = a
        .admit("not-an-ip", 3784, 100_000, 3, "test", notifier.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AdmissionAddress { .. }));

    assert_eq!(notifier.call_count().await, 0);
}

#[tokio::test]
async fn remote_admin_down_pulls_an_up_session_down_with_no_role() {
    init_tracing();
    let port_a = next_port();
    let port_b = next_port();
    let a = engine_on_port(port_a).await;
    let b = engine_on_port(port_b).await;

    let notifier_a = Arc::new(RecordingNotifier::default());
    let notifier_b = Arc::new(RecordingNotifier::default());

    a.admit("127.0.0.1", port_b, 100_000, 3, "test", notifier_a.clone())
        .await
        .unwrap();
    b.admit("127.0.0.1", port_a, 100_000, 3, "test", notifier_b.clone())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while a.session_state("127.0.0.1").await != Some(SessionState::Up) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("session should reach Up");

    // b administratively withdraws; a must see the mirrored AdminDown and
    // notify NOT_DEFINED, not MASTER (only Up->Down transitions do that).
    b.delete("127.0.0.1", port_a).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if a.session_state("127.0.0.1").await
                == Some(SessionState::AdminDown)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("a should observe the mirrored AdminDown");

    let saw_not_defined = notifier_a
        .wait_for(Role::NotDefined, Duration::from_millis(200))
        .await;
    assert!(saw_not_defined.is_some());
}
