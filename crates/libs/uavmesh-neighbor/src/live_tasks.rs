//! Live-broadcast / live-listen (spec.md §4.6): two independent tasks
//! that keep each node's `NeighborTable` populated.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use uavmesh_core::{NodeIp, Position, Stoppable};
use uavmesh_dsr::BroadcastTarget;

use crate::live_packet::{LivePacket, LIVE_PKT_LEN};
use crate::neighbor_table::NeighborTable;

/// Gap between the two duplicate broadcasts every interval (spec.md §4.6,
/// matching the DSR resolver's send-twice convention).
const DUPLICATE_SEND_GAP: Duration = Duration::from_micros(20);
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub struct LiveBroadcaster {
    my_ip: NodeIp,
    position: Position,
    socket: Arc<UdpSocket>,
    target: BroadcastTarget,
    interval: Duration,
    stoppable: Arc<Stoppable>,
}

impl LiveBroadcaster {
    pub fn new(
        my_ip: NodeIp,
        position: Position,
        socket: Arc<UdpSocket>,
        target: BroadcastTarget,
        interval: Duration,
        stoppable: Arc<Stoppable>,
    ) -> Self {
        LiveBroadcaster { my_ip, position, socket, target, interval, stoppable }
    }

    pub async fn run(&self) {
        let pkt = LivePacket::new(self.my_ip, self.position);
        let buf = pkt.serialize();
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => return,
                _ = tokio::time::sleep(self.interval) => {
                    self.target.send(&self.socket, &buf).await;
                    tokio::time::sleep(DUPLICATE_SEND_GAP).await;
                    self.target.send(&self.socket, &buf).await;
                }
            }
        }
    }
}

pub struct LiveListener {
    my_ip: NodeIp,
    socket: Arc<UdpSocket>,
    table: Arc<NeighborTable>,
    stoppable: Arc<Stoppable>,
}

impl LiveListener {
    pub fn new(my_ip: NodeIp, socket: Arc<UdpSocket>, table: Arc<NeighborTable>, stoppable: Arc<Stoppable>) -> Self {
        LiveListener { my_ip, socket, table, stoppable }
    }

    pub async fn run(&self) {
        let mut buf = [0u8; LIVE_PKT_LEN];
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => return,
                outcome = tokio::time::timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buf)) => {
                    match outcome {
                        Ok(Ok((len, _from))) => self.handle(&buf[..len]),
                        Ok(Err(err)) => log::warn!("live listener recv failed: {err}"),
                        Err(_elapsed) => continue,
                    }
                }
            }
        }
    }

    fn handle(&self, frame: &[u8]) {
        let pkt = match LivePacket::parse(frame) {
            Ok(pkt) => pkt,
            Err(err) => {
                log::warn!("dropping malformed live packet: {err}");
                return;
            }
        };
        if pkt.ip == self.my_ip {
            return; // our own broadcast echo
        }
        self.table.add_neighbor(pkt.ip, pkt.position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    async fn bind_local() -> (Arc<UdpSocket>, std::net::SocketAddr) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = socket.local_addr().unwrap();
        (Arc::new(socket), addr)
    }

    #[tokio::test]
    async fn broadcaster_populates_listener_table() {
        let a_ip = NodeIp::from_str("192.168.2.100").unwrap();
        let b_ip = NodeIp::from_str("192.168.2.101").unwrap();

        let (a_sock, a_addr) = bind_local().await;
        let (b_sock, b_addr) = bind_local().await;

        let stoppable = Stoppable::new();
        let broadcaster = LiveBroadcaster::new(
            a_ip,
            Position::new(1.0, 2.0),
            a_sock,
            BroadcastTarget::Peers(vec![b_addr]),
            Duration::from_millis(20),
            stoppable.clone(),
        );
        let table = Arc::new(NeighborTable::new());
        let listener = LiveListener::new(b_ip, b_sock, table.clone(), stoppable.clone());
        let _ = a_addr;

        let broadcaster_task = tokio::spawn(async move { broadcaster.run().await });
        let listener_task = tokio::spawn(async move { listener.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(table.contains(a_ip));

        stoppable.stop();
        let _ = tokio::time::timeout(Duration::from_secs(1), broadcaster_task).await;
        let _ = tokio::time::timeout(Duration::from_secs(1), listener_task).await;
    }

    #[tokio::test]
    async fn listener_ignores_its_own_echo() {
        let my_ip = NodeIp::from_str("192.168.2.100").unwrap();
        let table = Arc::new(NeighborTable::new());
        let (socket, _addr) = bind_local().await;
        let stoppable = Stoppable::new();
        let listener = LiveListener::new(my_ip, socket, table.clone(), stoppable);
        let pkt = LivePacket::new(my_ip, Position::new(0.0, 0.0));
        listener.handle(&pkt.serialize());
        assert!(!table.contains(my_ip));
    }
}
