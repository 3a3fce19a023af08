//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

use crate::packet::DecodeError;

/// Errors returned synchronously to the caller from admission and
/// deletion. Every other error kind is absorbed by the core.
#[derive(Debug)]
pub enum Error {
    /// A session for this remote IP already exists.
    AdmissionConflict { remote_ip: String },
    /// `tx_interval_us` below the floor, or `detect_multiplier == 0`.
    AdmissionArgs { reason: &'static str },
    /// The peer IP didn't parse, or no local address can serve as the
    /// discriminator.
    AdmissionAddress { reason: String },
    /// The outbound socket failed to connect, or timed out doing so.
    AdmissionConnect { source: std::io::Error },
    /// `Delete` of a remote IP with no session.
    NotFound { remote_ip: String },
}

/// Errors the core logs and discards without tearing anything down.
#[derive(Debug)]
pub enum TransientError {
    /// A send on a session's socket failed.
    SendFailed { source: std::io::Error },
    /// The demultiplexer's read failed; the listener keeps running.
    RecvFailed { source: std::io::Error },
    /// A decoded packet didn't resolve to any known session.
    NoMatchingSession { my_discriminator: u32 },
    /// A packet was dropped before reaching the state machine.
    Malformed { source: DecodeError },
}

// ===== impl Error =====

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AdmissionConflict { remote_ip } => {
                write!(f, "session for {remote_ip} already exists")
            }
            Error::AdmissionArgs { reason } => {
                write!(f, "invalid admission arguments: {reason}")
            }
            Error::AdmissionAddress { reason } => {
                write!(f, "failed to resolve session address: {reason}")
            }
            Error::AdmissionConnect { .. } => {
                write!(f, "failed to dial peer")
            }
            Error::NotFound { remote_ip } => {
                write!(f, "no session for {remote_ip}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::AdmissionConnect { source } => Some(source),
            _ => None,
        }
    }
}

// ===== impl TransientError =====

impl TransientError {
    /// Logs the error using the tracing API. Called in place of any
    /// further propagation: transient errors never reach the caller.
    pub(crate) fn log(&self) {
        match self {
            TransientError::SendFailed { source } => {
                warn!(error = %source, "{self}");
            }
            TransientError::RecvFailed { source } => {
                warn!(error = %source, "{self}");
            }
            TransientError::NoMatchingSession { my_discriminator } => {
                warn!(discriminator = %my_discriminator, "{self}");
            }
            TransientError::Malformed { source } => {
                warn!(error = %source, "{self}");
            }
        }
    }
}

impl std::fmt::Display for TransientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientError::SendFailed { .. } => {
                write!(f, "failed to send BFD packet")
            }
            TransientError::RecvFailed { .. } => {
                write!(f, "failed to receive BFD packet")
            }
            TransientError::NoMatchingSession { .. } => {
                write!(f, "packet discriminator matched no known session")
            }
            TransientError::Malformed { .. } => {
                write!(f, "dropped malformed packet")
            }
        }
    }
}

impl std::error::Error for TransientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransientError::SendFailed { source }
            | TransientError::RecvFailed { source } => Some(source),
            TransientError::Malformed { source } => Some(source),
            TransientError::NoMatchingSession { .. } => None,
        }
    }
}
