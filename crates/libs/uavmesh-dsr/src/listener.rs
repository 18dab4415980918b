//! DSR listener (spec.md §4.5): the task bound to the DSR UDP port that
//! processes every incoming request and response frame.

use crate::broadcast::{BroadcastTarget, UnicastResolver};
use crate::packet::{DsrPacketType, DsrRoutePacket};
use crate::reqid::ReqIdRecorder;
use crate::resolver::DUPLICATE_SEND_GAP;
use crate::route_table::RouteTable;
use crate::wait_map::WaitMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use uavmesh_core::{NodeIp, Stoppable};

/// Generous upper bound on a DSR frame: header plus a route long enough
/// for any realistic mesh diameter.
const MAX_DSR_FRAME_BYTES: usize = 1500;
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub struct DsrListener {
    my_ip: NodeIp,
    socket: Arc<UdpSocket>,
    broadcast: BroadcastTarget,
    unicast: UnicastResolver,
    route_table: Arc<RouteTable>,
    reqid_recorder: Arc<ReqIdRecorder>,
    wait_map: Arc<WaitMap>,
    stoppable: Arc<Stoppable>,
}

impl DsrListener {
    pub fn new(
        my_ip: NodeIp,
        socket: Arc<UdpSocket>,
        broadcast: BroadcastTarget,
        route_table: Arc<RouteTable>,
        reqid_recorder: Arc<ReqIdRecorder>,
        wait_map: Arc<WaitMap>,
        stoppable: Arc<Stoppable>,
    ) -> Self {
        DsrListener {
            my_ip,
            socket,
            broadcast,
            unicast: UnicastResolver::Direct(uavmesh_core::ports::PORT_DSR),
            route_table,
            reqid_recorder,
            wait_map,
            stoppable,
        }
    }

    /// Overrides unicast address resolution, for test harnesses that
    /// can't bind the loopback sockets at their simulated `NodeIp`.
    pub fn with_unicast_resolver(mut self, unicast: UnicastResolver) -> Self {
        self.unicast = unicast;
        self
    }

    pub async fn run(&self) {
        let mut buf = vec![0u8; MAX_DSR_FRAME_BYTES];
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => break,
                outcome = tokio::time::timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buf)) => {
                    match outcome {
                        Ok(Ok((len, _from))) => self.handle_frame(&buf[..len]).await,
                        Ok(Err(err)) => log::warn!("dsr listener recv failed: {err}"),
                        Err(_elapsed) => continue,
                    }
                }
            }
        }
    }

    async fn handle_frame(&self, frame: &[u8]) {
        let pkt = match DsrRoutePacket::parse(frame) {
            Ok(pkt) => pkt,
            Err(err) => {
                log::warn!("dropping malformed dsr frame: {err}");
                return;
            }
        };
        match pkt.pkt_type {
            DsrPacketType::Request => self.process_request(pkt).await,
            DsrPacketType::Response => self.process_response(pkt).await,
        }
    }

    async fn process_request(&self, pkt: DsrRoutePacket) {
        if pkt.src == pkt.dst {
            log::warn!("dropping degenerate 0-hop dsr request from {}", pkt.src);
            return;
        }
        if pkt.src == self.my_ip {
            return; // our own broadcast echo
        }
        if self.reqid_recorder.exists(pkt.src, pkt.req_id) {
            return;
        }
        self.reqid_recorder.add(pkt.src, pkt.req_id);

        let Some(&prev_hop) = pkt.route.last() else {
            log::warn!("dropping dsr request with empty route from {}", pkt.src);
            return;
        };
        self.route_table.update(pkt.src, prev_hop, pkt.hop);
        self.route_table.update(prev_hop, prev_hop, 1);

        if pkt.dst != self.my_ip {
            let mut route = pkt.route.clone();
            route.push(self.my_ip);
            let forwarded = DsrRoutePacket {
                pkt_type: DsrPacketType::Request,
                hop: pkt.hop + 1,
                route,
                ..pkt
            };
            let buf = forwarded.serialize();
            self.broadcast_twice(&buf).await;
        } else {
            let mut route = pkt.route.clone();
            route.push(self.my_ip);
            route.reverse();
            let Some(&next) = route.get(1) else {
                log::warn!("dropping dsr response with degenerate route to {}", pkt.src);
                return;
            };
            let response = DsrRoutePacket { pkt_type: DsrPacketType::Response, hop: 1, route, ..pkt };
            self.unicast_to(next, &response.serialize()).await;
        }
    }

    async fn process_response(&self, pkt: DsrRoutePacket) {
        if pkt.hop == 0 {
            log::warn!("dropping dsr response with hop=0 for {}", pkt.dst);
            return;
        }
        let Some(&reached_via) = pkt.route.get((pkt.hop - 1) as usize) else {
            log::warn!("dropping dsr response with out-of-bounds hop for {}", pkt.dst);
            return;
        };
        self.route_table.update(pkt.dst, reached_via, pkt.hop);

        if pkt.src != self.my_ip {
            let new_hop = pkt.hop + 1;
            let Some(&next) = pkt.route.get(new_hop as usize) else {
                log::warn!("dropping dsr response with out-of-bounds forward hop for {}", pkt.dst);
                return;
            };
            let forwarded = DsrRoutePacket { hop: new_hop, ..pkt };
            self.unicast_to(next, &forwarded.serialize()).await;
        } else {
            self.wait_map.mark_arrived(pkt.dst);
        }
    }

    async fn broadcast_twice(&self, buf: &[u8]) {
        self.broadcast.send(&self.socket, buf).await;
        tokio::time::sleep(DUPLICATE_SEND_GAP).await;
        self.broadcast.send(&self.socket, buf).await;
    }

    async fn unicast_to(&self, dst: NodeIp, buf: &[u8]) {
        match self.unicast.resolve(dst) {
            Some(addr) => {
                if let Err(err) = self.socket.send_to(buf, addr).await {
                    log::warn!("dsr unicast send to {dst} failed: {err}");
                }
            }
            None => log::warn!("dsr unicast target {dst} has no known address"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn ip(s: &str) -> NodeIp {
        NodeIp::from_str(s).unwrap()
    }

    async fn bind_local() -> (Arc<UdpSocket>, std::net::SocketAddr) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = socket.local_addr().unwrap();
        (Arc::new(socket), addr)
    }

    /// S2 (spec.md §8): replaying the same request twice to a rebroadcasting
    /// node must still produce exactly one rebroadcast (two datagrams, since
    /// every send is duplicated per spec.md §4.5 step 5) — the request-id
    /// dedup set swallows the replay.
    #[tokio::test]
    async fn duplicate_request_is_rebroadcast_exactly_once() {
        let a_ip = ip("192.168.2.100");
        let b_ip = ip("192.168.2.101");
        let dst_ip = ip("192.168.2.254"); // unreachable from B; B always rebroadcasts.

        let (a_sock, _a_addr) = bind_local().await;
        let (b_sock, b_addr) = bind_local().await;
        let (c_sock, _c_addr) = bind_local().await;

        let stop = Stoppable::new();
        let b_listener = DsrListener::new(
            b_ip,
            b_sock,
            BroadcastTarget::Peers(vec![c_sock.local_addr().unwrap()]),
            Arc::new(RouteTable::new()),
            Arc::new(ReqIdRecorder::new()),
            Arc::new(WaitMap::new()),
            stop.clone(),
        );
        let b_task = tokio::spawn(async move { b_listener.run().await });

        let request = DsrRoutePacket {
            pkt_type: DsrPacketType::Request,
            src: a_ip,
            dst: dst_ip,
            hop: 1,
            req_id: 7,
            route: vec![a_ip],
        };
        let buf = request.serialize();
        a_sock.send_to(&buf, b_addr).await.unwrap();
        a_sock.send_to(&buf, b_addr).await.unwrap();

        let mut received = 0usize;
        let mut frame = vec![0u8; 1500];
        loop {
            match tokio::time::timeout(Duration::from_millis(300), c_sock.recv_from(&mut frame)).await {
                Ok(Ok(_)) => received += 1,
                _ => break,
            }
        }

        assert_eq!(received, 2, "expected exactly one rebroadcast (sent twice), got {received} datagrams");
        stop.stop();
        let _ = tokio::time::timeout(Duration::from_secs(1), b_task).await;
    }
}
