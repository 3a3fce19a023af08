//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The notifier capability consumed by the core: a single
//! callback shape the host installs on a session at admission time.

/// Role derived from discriminator comparison on a state transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Master,
    Backup,
    NotDefined,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Master => write!(f, "MASTER"),
            Role::Backup => write!(f, "BACKUP"),
            Role::NotDefined => write!(f, "NOT_DEFINED"),
        }
    }
}

/// Host-supplied capability receiving state-change events from the core.
///
/// The core guarantees this is invoked only on a state change (never twice
/// for the same transition), outside of any session or engine lock.
pub trait Notifier: Send + Sync {
    fn bfd_session_notify(&self, instance: &str, remote: &str, role: Role);
}

/// A [`Notifier`] that discards every notification. Useful for tests and
/// for callers that only care about polling session state directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn bfd_session_notify(&self, _instance: &str, _remote: &str, _role: Role) {}
}
