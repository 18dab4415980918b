//! Neighbor listener (spec.md §4.9): a bound TCP listener on the report
//! port. Every accepted connection is handled on its own task; the sink
//! parses each report into its topology sink, every other node relays
//! the untouched bytes toward the sink with up to 5 retries 2s apart.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uavmesh_core::{NodeIp, Stoppable};
use uavmesh_dsr::{DsrResolver, ResolveMode};

use crate::ingest::TopologyIngest;
use crate::report::{NeighborReport, NEIB_PKT_HEADER_LEN};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(3);
const RELAY_RETRY_COUNT: usize = 5;
const RELAY_RETRY_GAP: Duration = Duration::from_secs(2);
const ROUTE_TIMEOUT: Duration = Duration::from_secs(3);
const POST_SEND_LINGER: Duration = Duration::from_millis(20);

pub enum ReportDisposition {
    /// This node is the sink: parse every report into `ingest`.
    Ingest(Arc<dyn TopologyIngest>),
    /// This node forwards reports on toward `sink_ip`.
    Relay { sink_ip: NodeIp, resolver: Arc<DsrResolver>, report_port: u16 },
}

pub struct NeighborListener {
    listener: TcpListener,
    disposition: Arc<ReportDisposition>,
    stoppable: Arc<Stoppable>,
}

impl NeighborListener {
    pub fn new(listener: TcpListener, disposition: ReportDisposition, stoppable: Arc<Stoppable>) -> Self {
        NeighborListener { listener, disposition: Arc::new(disposition), stoppable }
    }

    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => return,
                outcome = tokio::time::timeout(ACCEPT_TIMEOUT, self.listener.accept()) => {
                    match outcome {
                        Ok(Ok((stream, _peer))) => {
                            let disposition = self.disposition.clone();
                            let stoppable = self.stoppable.clone();
                            tokio::spawn(async move { handle_client(stream, disposition, stoppable).await });
                        }
                        Ok(Err(err)) => log::warn!("neighbor listener accept failed: {err}"),
                        Err(_elapsed) => continue,
                    }
                }
            }
        }
    }
}

async fn handle_client(mut stream: TcpStream, disposition: Arc<ReportDisposition>, stoppable: Arc<Stoppable>) {
    loop {
        let mut header = [0u8; NEIB_PKT_HEADER_LEN];
        if read_exact_tolerant(&mut stream, &mut header).await.is_none() {
            return; // peer closed
        }
        let count = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let body_len = count * crate::live_packet::LIVE_PKT_LEN;

        let mut body = vec![0u8; body_len];
        if read_exact_tolerant(&mut stream, &mut body).await.is_none() {
            log::warn!("neighbor report connection closed mid-body");
            return;
        }

        let mut frame = Vec::with_capacity(NEIB_PKT_HEADER_LEN + body_len);
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&body);

        match &*disposition {
            ReportDisposition::Ingest(ingest) => dispatch_ingest(&frame, ingest.as_ref()),
            ReportDisposition::Relay { sink_ip, resolver, report_port } => {
                relay_report(&frame, *sink_ip, resolver, *report_port, &stoppable).await;
            }
        }
    }
}

/// Tolerant of TCP short-reads (spec.md §4.9): keeps calling `read` until
/// the buffer is full or the connection is closed.
async fn read_exact_tolerant(stream: &mut TcpStream, buf: &mut [u8]) -> Option<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]).await {
            Ok(0) => return None,
            Ok(n) => filled += n,
            Err(err) => {
                log::warn!("neighbor report read failed: {err}");
                return None;
            }
        }
    }
    Some(())
}

fn dispatch_ingest(frame: &[u8], ingest: &dyn TopologyIngest) {
    let report = match NeighborReport::parse(frame) {
        Ok(report) => report,
        Err(err) => {
            log::warn!("dropping malformed neighbor report: {err}");
            return;
        }
    };
    let neighbors: Vec<_> = report.neighbors.iter().map(|p| (p.ip, p.position)).collect();
    ingest.ingest_report(report.sender, &neighbors);
}

async fn relay_report(
    frame: &[u8],
    sink_ip: NodeIp,
    resolver: &DsrResolver,
    report_port: u16,
    stoppable: &Stoppable,
) {
    let mut route_fail = false;
    for _ in 0..RELAY_RETRY_COUNT {
        tokio::select! {
            _ = stoppable.wait_for_stop() => return,
            _ = tokio::time::sleep(RELAY_RETRY_GAP) => {}
        }

        let mode = if route_fail { ResolveMode::SendReqAnyway } else { ResolveMode::CheckTableFirst };
        let next_hop = match resolver.get_next_hop(sink_ip, ROUTE_TIMEOUT, mode).await {
            Ok(next_hop) => {
                route_fail = false;
                next_hop
            }
            Err(err) => {
                route_fail = true;
                log::warn!("neighbor relay: no route to sink: {err}");
                continue;
            }
        };

        let addr = (std::net::Ipv4Addr::from(next_hop), report_port);
        match TcpStream::connect(addr).await {
            Ok(mut stream) => {
                if let Err(err) = stream.write_all(frame).await {
                    route_fail = true;
                    log::warn!("neighbor relay: send to {next_hop} failed: {err}");
                    continue;
                }
                tokio::time::sleep(POST_SEND_LINGER).await;
                return;
            }
            Err(err) => {
                route_fail = true;
                log::warn!("neighbor relay: connect to {next_hop} failed: {err}");
            }
        }
    }
    log::warn!("neighbor relay: exhausted {RELAY_RETRY_COUNT} attempts, dropping report");
}
