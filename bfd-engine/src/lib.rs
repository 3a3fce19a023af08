//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! A Bidirectional Forwarding Detection (BFD) session engine: a
//! concurrent registry of per-peer sessions exchanging fixed-size control
//! packets at sub-second cadence, driving a four-state session machine,
//! and reporting state transitions plus a MASTER/BACKUP role to a host
//! application.
//!
//! The REST/HTTP control surface, CLI, and daemon configuration loading
//! that would normally sit in front of this engine are external
//! collaborators; they reach the engine only through [`Engine::admit`]
//! and [`Engine::delete`].

pub mod config;
mod debug;
mod discriminator;
pub mod engine;
mod error;
mod network;
pub mod notify;
pub mod packet;
mod session;
mod ticker;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::Error;
pub use notify::{NullNotifier, Notifier, Role};
pub use packet::{DecodeError, Packet, SessionState};
