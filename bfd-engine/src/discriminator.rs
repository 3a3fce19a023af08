//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Local discriminator derivation.
//!
//! `my_discriminator` is the numeric form of whichever local IPv4 address
//! shares a network with the peer, falling back to the first enumerable
//! local address.

use std::net::{Ipv4Addr, SocketAddrV4};

use ipnetwork::Ipv4Network;
use nix::ifaddrs::getifaddrs;

use crate::error::Error;

pub(crate) fn derive_local_discriminator(
    peer: Ipv4Addr,
) -> Result<u32, Error> {
    let mut first: Option<Ipv4Addr> = None;

    let addrs = getifaddrs().map_err(|source| Error::AdmissionAddress {
        reason: format!("failed to enumerate local interfaces: {source}"),
    })?;

    for iface in addrs {
        let Some(addr) = iface
            .address
            .as_ref()
            .and_then(|a| a.as_sockaddr_in())
            .map(|a| *SocketAddrV4::from(*a).ip())
        else {
            continue;
        };

        if first.is_none() {
            first = Some(addr);
        }

        let Some(netmask) = iface
            .netmask
            .as_ref()
            .and_then(|a| a.as_sockaddr_in())
            .map(|a| *SocketAddrV4::from(*a).ip())
        else {
            continue;
        };

        if let Ok(network) = Ipv4Network::with_netmask(addr, netmask) {
            if network.contains(peer) {
                return Ok(u32::from(addr));
            }
        }
    }

    first.map(u32::from).ok_or_else(|| Error::AdmissionAddress {
        reason: "no local IPv4 address available".to_owned(),
    })
}
