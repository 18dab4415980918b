//! Where a DSR request/rebroadcast actually goes.
//!
//! In production this is the subnet broadcast address from `NodeConfig`;
//! loopback-bound integration tests can't rely on UDP broadcast fanning
//! out across distinct `127.0.0.1` ports the way a real L2 broadcast
//! domain would, so tests use an explicit peer list instead. Both paths
//! go through the same send-twice-with-a-gap logic (spec.md §4.4 step 2,
//! §4.5 step 5).

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use uavmesh_core::NodeIp;

#[derive(Debug, Clone)]
pub enum BroadcastTarget {
    /// The real subnet broadcast address, e.g. `192.168.2.255:9190`.
    Address(SocketAddr),
    /// A fixed set of neighbor unicast addresses, standing in for a
    /// broadcast domain in tests.
    Peers(Vec<SocketAddr>),
}

impl BroadcastTarget {
    pub async fn send(&self, socket: &UdpSocket, buf: &[u8]) {
        match self {
            BroadcastTarget::Address(addr) => {
                if let Err(err) = socket.send_to(buf, addr).await {
                    log::warn!("dsr broadcast send to {addr} failed: {err}");
                }
            }
            BroadcastTarget::Peers(peers) => {
                for peer in peers {
                    if let Err(err) = socket.send_to(buf, peer).await {
                        log::warn!("dsr broadcast send to {peer} failed: {err}");
                    }
                }
            }
        }
    }
}

/// Resolves a `NodeIp` to the socket address a unicast DSR response or
/// forwarded packet should be sent to.
#[derive(Debug, Clone)]
pub enum UnicastResolver {
    /// Production path: the node's IP on the fixed DSR port.
    Direct(u16),
    /// Test path: an explicit address book, since loopback test nodes
    /// can't bind the `NodeIp` values they represent.
    Map(HashMap<NodeIp, SocketAddr>),
}

impl UnicastResolver {
    pub fn resolve(&self, ip: NodeIp) -> Option<SocketAddr> {
        match self {
            UnicastResolver::Direct(port) => Some(SocketAddr::new(IpAddr::V4(ip.into()), *port)),
            UnicastResolver::Map(map) => map.get(&ip).copied(),
        }
    }
}
