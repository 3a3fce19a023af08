//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, debug_span};

use crate::packet::SessionState;

// BFD debug messages.
#[derive(Debug)]
pub(crate) enum Debug<'a> {
    SessionCreate(&'a str),
    SessionDelete(&'a str),
    FsmTransition(&'a str, SessionState, SessionState),
    DetectionTimeExpiry(&'a str),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::SessionCreate(remote) | Debug::SessionDelete(remote) => {
                debug_span!("session", %remote).in_scope(|| {
                    debug!("{self}");
                });
            }
            Debug::FsmTransition(remote, old_state, new_state) => {
                debug_span!("session", %remote).in_scope(|| {
                    debug!(%old_state, %new_state, "{self}");
                });
            }
            Debug::DetectionTimeExpiry(remote) => {
                debug_span!("session", %remote).in_scope(|| {
                    debug!("{self}");
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::SessionCreate(..) => write!(f, "session created"),
            Debug::SessionDelete(..) => write!(f, "session deleted"),
            Debug::FsmTransition(..) => write!(f, "state transition"),
            Debug::DetectionTimeExpiry(..) => {
                write!(f, "detection timer expired")
            }
        }
    }
}
