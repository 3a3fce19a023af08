//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Engine-level configuration: the core doesn't read a config file itself,
//! but it still needs somewhere to carry its own admission floors and
//! listen port, handed in by whatever host embeds it.

use serde::Deserialize;

use crate::network::PORT_DST_SINGLE_HOP;
use crate::session::MIN_RX_INTERVAL_US;

/// Configuration accepted by [`crate::Engine::new`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// UDP port the demultiplexer binds on the wildcard address.
    pub listen_port: u16,
    /// Floor applied to a session's Required Min Rx Interval.
    pub required_min_rx_interval_us: u32,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            listen_port: PORT_DST_SINGLE_HOP,
            required_min_rx_interval_us: MIN_RX_INTERVAL_US,
        }
    }
}
