//! Neighbor reporter (spec.md §4.8): every `interval`, packs the local
//! `NeighborTable` into a `NeighborReport` and TCP-sends it one hop
//! closer to the sink. Sink nodes send to themselves and hand the bytes
//! straight to the local ingest sink instead of opening a loopback
//! connection.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use uavmesh_core::{NodeIp, Position, Stoppable};
use uavmesh_dsr::{DsrResolver, ResolveMode};

use crate::ingest::TopologyIngest;
use crate::neighbor_table::NeighborTable;
use crate::report::NeighborReport;

/// Connect, send, then hold the socket open briefly before closing
/// (spec.md §4.8 "Connection is short-lived").
const POST_SEND_LINGER: Duration = Duration::from_millis(20);
const ROUTE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct NeighborReporter {
    my_ip: NodeIp,
    position: Position,
    sink_ip: NodeIp,
    is_sink: bool,
    table: Arc<NeighborTable>,
    resolver: Arc<DsrResolver>,
    report_port: u16,
    interval: Duration,
    stoppable: Arc<Stoppable>,
    /// Only used when this node is the sink: reports addressed to
    /// ourselves are handed straight to the ingest sink.
    sink_ingest: Option<Arc<dyn TopologyIngest>>,
}

impl NeighborReporter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        my_ip: NodeIp,
        position: Position,
        sink_ip: NodeIp,
        is_sink: bool,
        table: Arc<NeighborTable>,
        resolver: Arc<DsrResolver>,
        report_port: u16,
        interval: Duration,
        stoppable: Arc<Stoppable>,
        sink_ingest: Option<Arc<dyn TopologyIngest>>,
    ) -> Self {
        NeighborReporter {
            my_ip,
            position,
            sink_ip,
            is_sink,
            table,
            resolver,
            report_port,
            interval,
            stoppable,
            sink_ingest,
        }
    }

    pub async fn run(&self) {
        let mut route_fail = false;
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => return,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let report = NeighborReport {
                sender: self.my_ip,
                sender_position: self.position,
                neighbors: self.table.to_live_packets(),
            };
            let buf = match report.serialize() {
                Ok(buf) => buf,
                Err(err) => {
                    log::warn!("neighbor report too large to send: {err}");
                    continue;
                }
            };

            if self.is_sink {
                if let Some(ingest) = &self.sink_ingest {
                    let neighbors: Vec<_> = report.neighbors.iter().map(|p| (p.ip, p.position)).collect();
                    ingest.ingest_report(self.my_ip, &neighbors);
                }
                continue;
            }

            let mode = if route_fail { ResolveMode::SendReqAnyway } else { ResolveMode::CheckTableFirst };
            let next_hop = match self.resolver.get_next_hop(self.sink_ip, ROUTE_TIMEOUT, mode).await {
                Ok(next_hop) => {
                    route_fail = false;
                    next_hop
                }
                Err(err) => {
                    route_fail = true;
                    log::warn!("neighbor reporter: no route to sink: {err}");
                    continue;
                }
            };

            if let Err(err) = self.send_to(next_hop, &buf).await {
                route_fail = true;
                log::warn!("neighbor reporter: connect to {next_hop} failed: {err}");
            }
        }
    }

    async fn send_to(&self, next_hop: NodeIp, buf: &[u8]) -> std::io::Result<()> {
        let addr = (std::net::Ipv4Addr::from(next_hop), self.report_port);
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(buf).await?;
        tokio::time::sleep(POST_SEND_LINGER).await;
        drop(stream);
        Ok(())
    }
}
