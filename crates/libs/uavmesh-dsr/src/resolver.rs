//! DSR route resolver (`getNextHop`, spec.md §4.4): the synchronous,
//! blocking-until-resolved entry point every other component uses to find
//! a next hop toward a destination.

use crate::broadcast::BroadcastTarget;
use crate::packet::{DsrPacketType, DsrRoutePacket};
use crate::route_table::RouteTable;
use crate::wait_map::{EnterOutcome, WaitMap, WaitState};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use uavmesh_core::{NodeIp, RouteError};

/// Gap between the two duplicate broadcasts / unicasts the protocol sends
/// for every request and rebroadcast (spec.md §4.4 step 2, §4.5 step 5).
pub const DUPLICATE_SEND_GAP: Duration = Duration::from_micros(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    CheckTableFirst,
    SendReqAnyway,
}

/// Owns the socket used to broadcast requests and the tables shared with
/// the DSR listener (route cache + wait-map). One instance per node.
pub struct DsrResolver {
    my_ip: NodeIp,
    socket: Arc<UdpSocket>,
    broadcast: BroadcastTarget,
    route_table: Arc<RouteTable>,
    wait_map: Arc<WaitMap>,
    next_req_id: AtomicU32,
}

impl DsrResolver {
    pub fn new(
        my_ip: NodeIp,
        socket: Arc<UdpSocket>,
        broadcast: BroadcastTarget,
        route_table: Arc<RouteTable>,
        wait_map: Arc<WaitMap>,
    ) -> Self {
        DsrResolver { my_ip, socket, broadcast, route_table, wait_map, next_req_id: AtomicU32::new(0) }
    }

    fn next_req_id(&self) -> u32 {
        self.next_req_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn get_next_hop(
        &self,
        dst: NodeIp,
        timeout: Duration,
        mode: ResolveMode,
    ) -> Result<NodeIp, RouteError> {
        if mode == ResolveMode::CheckTableFirst {
            if let Some(entry) = self.route_table.find(dst) {
                return Ok(entry.next_hop);
            }
        }

        // Step 1: invalidate any stale cache entry before re-resolving.
        self.route_table.delete(dst);

        // Step 2: broadcast the request twice, ~20us apart.
        let pkt = DsrRoutePacket {
            pkt_type: DsrPacketType::Request,
            src: self.my_ip,
            dst,
            hop: 1,
            req_id: self.next_req_id(),
            route: vec![self.my_ip],
        };
        let buf = pkt.serialize();
        self.broadcast_twice(&buf).await;

        // Step 3: register interest in dst.
        match self.wait_map.try_enter(dst) {
            EnterOutcome::Fresh | EnterOutcome::Piggyback => {}
            EnterOutcome::Settled(state) => return self.finish(dst, state),
        }

        // Step 4: per-call timeout timer.
        let wait_map = self.wait_map.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            wait_map.mark_timeout(dst);
        });

        // Step 5: wait for a transition out of Waiting.
        match self.wait_map.wait_until_settled(dst).await {
            None => self.route_table.find(dst).map(|e| e.next_hop).ok_or(RouteError::DestinationUnreachable(dst)),
            Some(state) => {
                // Step 6: first to observe a terminal state erases it.
                self.wait_map.erase(dst);
                self.finish(dst, state)
            }
        }
    }

    fn finish(&self, dst: NodeIp, state: WaitState) -> Result<NodeIp, RouteError> {
        if state == WaitState::Timeout {
            return Err(RouteError::DestinationUnreachable(dst));
        }
        self.route_table.find(dst).map(|e| e.next_hop).ok_or(RouteError::DestinationUnreachable(dst))
    }

    async fn broadcast_twice(&self, buf: &[u8]) {
        self.broadcast.send(&self.socket, buf).await;
        tokio::time::sleep(DUPLICATE_SEND_GAP).await;
        self.broadcast.send(&self.socket, buf).await;
    }
}
