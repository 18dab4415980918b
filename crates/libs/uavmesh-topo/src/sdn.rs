//! SDN reporter (spec.md §4.11, sink only): periodically serializes the
//! current adjacency matrix and per-node position deltas and UDP-sends
//! them to the external controller.
//!
//! Frame layout: 1-byte `nodeCount` N; N one-byte node IDs (last octet of
//! each IP); `N*N` bytes adjacency matrix; then for every non-sink node,
//! two 16-byte zero-padded ASCII fields carrying `posX - sinkPosX` and
//! `posY - sinkPosY`.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use uavmesh_core::wire::encode_ascii_double;
use uavmesh_core::{NodeIp, Position, Stoppable};

use crate::graph::TopoGraph;

const SDN_POS_FIELD_WIDTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no topology information to report yet")]
pub struct NoTopology;

/// Builds the SDN topology frame from the graph's current matrix and the
/// sink's own position (spec.md §4.11). Returns `NoTopology` if the graph
/// has no nodes yet, matching the source's "No topo information!" guard.
pub fn serialize_topo_frame(graph: &TopoGraph, sink_ip: NodeIp, sink_pos: Position) -> Result<Vec<u8>, NoTopology> {
    let (node_list, matrix) = graph.to_matrix();
    let node_count = node_list.len();
    if node_count == 0 {
        return Err(NoTopology);
    }

    let mut buf = Vec::with_capacity(1 + node_count + node_count * node_count + 2 * SDN_POS_FIELD_WIDTH * node_count);
    buf.push(node_count as u8);
    for ip in &node_list {
        buf.push(ip.last_octet());
    }
    for row in &matrix {
        buf.extend_from_slice(row);
    }
    for &ip in &node_list {
        if ip == sink_ip {
            continue;
        }
        let pos = graph.get_node_pos(ip).unwrap_or(Position::new(0.0, 0.0));
        buf.extend_from_slice(&encode_ascii_double(pos.x - sink_pos.x, SDN_POS_FIELD_WIDTH));
        buf.extend_from_slice(&encode_ascii_double(pos.y - sink_pos.y, SDN_POS_FIELD_WIDTH));
    }
    Ok(buf)
}

pub struct SdnReporter {
    graph: Arc<TopoGraph>,
    sink_ip: NodeIp,
    sink_pos: Position,
    socket: Arc<UdpSocket>,
    controller_addr: std::net::SocketAddr,
    interval: Duration,
    stoppable: Arc<Stoppable>,
}

impl SdnReporter {
    pub fn new(
        graph: Arc<TopoGraph>,
        sink_ip: NodeIp,
        sink_pos: Position,
        socket: Arc<UdpSocket>,
        controller_addr: std::net::SocketAddr,
        interval: Duration,
        stoppable: Arc<Stoppable>,
    ) -> Self {
        SdnReporter { graph, sink_ip, sink_pos, socket, controller_addr, interval, stoppable }
    }

    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => return,
                _ = tokio::time::sleep(self.interval) => {}
            }

            match serialize_topo_frame(&self.graph, self.sink_ip, self.sink_pos) {
                Ok(buf) => {
                    if let Err(err) = self.socket.send_to(&buf, self.controller_addr).await {
                        log::warn!("sdn reporter: send to controller failed: {err}");
                    } else {
                        log::info!("topo uploaded to controller");
                    }
                }
                Err(_) => log::warn!("sdn reporter: no topo information yet"),
            }
        }
    }
}
