//! Wires one `NodeConfig` into every singleton table and background task
//! named by spec.md §4, the way `reticulumd`'s `bootstrap::bootstrap`
//! turns a parsed config into a running daemon. Unlike `reticulumd`
//! (single-threaded, `Rc`-based `rns_transport`), every uavmesh-* crate
//! is `Arc`/`Send` throughout, so this runs on the ordinary
//! multi-threaded runtime and every task is a plain `tokio::spawn`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use uavmesh_core::{ports, NodeConfig, Stoppable};
use uavmesh_dsr::{BroadcastTarget, DsrListener, DsrResolver, ReqIdRecorder, RouteTable, WaitMap};
use uavmesh_neighbor::{
    LiveBroadcaster, LiveListener, NeighborListener, NeighborReporter, NeighborTable, ReportDisposition, TopologyIngest,
};
use uavmesh_topo::{SdnListener, SdnReporter, TopoGraph};
use uavmesh_video::{queues, LostList, NullRelayerEngine, PublishingList, VideoTransCtrler};

/// Default periods named by spec.md §4.6/§4.7/§4.8/§4.10 (the original
/// source's `sys_config.cpp` never exposes these as config keys, so
/// they stay compile-time constants here too).
const LIVE_BROADCAST_INTERVAL: Duration = Duration::from_secs(3);
const NEIGHBOR_TABLE_TIMEOUT: Duration = Duration::from_secs(5);
const NEIGHBOR_REPORT_INTERVAL: Duration = Duration::from_secs(5);
const TOPO_EDGE_TIMEOUT: Duration = Duration::from_secs(15);
const SDN_REPORT_INTERVAL: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub(super) enum BootstrapError {
    #[error("failed to bind {purpose} socket on {addr}: {source}")]
    Bind { purpose: &'static str, addr: SocketAddr, source: std::io::Error },
    #[error("failed to enable broadcast on {purpose} socket: {source}")]
    Broadcast { purpose: &'static str, source: std::io::Error },
}

/// The running daemon: every spawned task's handle, in spawn order, and
/// the cancellation flag shared by all of them. `main` stops the flag
/// once, then joins `tasks` in reverse order (spec.md §4.14).
pub(super) struct RunningNode {
    pub(super) stoppable: Arc<Stoppable>,
    pub(super) tasks: Vec<JoinHandle<()>>,
}

pub(super) async fn bootstrap(config: NodeConfig) -> Result<RunningNode, BootstrapError> {
    let stoppable = Stoppable::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let broadcast_addr = |port: u16| SocketAddr::new(Ipv4Addr::from(config.broadcast_ip).into(), port);

    // --- DSR: route discovery (spec.md §4.1-§4.5) -------------------------
    let dsr_socket = Arc::new(bind_broadcast_udp("dsr", ports::PORT_DSR).await?);
    let route_table = Arc::new(RouteTable::new());
    let reqid_recorder = Arc::new(ReqIdRecorder::new());
    let wait_map = Arc::new(WaitMap::new());

    let dsr_resolver = Arc::new(DsrResolver::new(
        config.my_ip,
        dsr_socket.clone(),
        BroadcastTarget::Address(broadcast_addr(ports::PORT_DSR)),
        route_table.clone(),
        wait_map.clone(),
    ));

    let dsr_listener = DsrListener::new(
        config.my_ip,
        dsr_socket,
        BroadcastTarget::Address(broadcast_addr(ports::PORT_DSR)),
        route_table,
        reqid_recorder,
        wait_map,
        stoppable.clone(),
    );
    tasks.push(tokio::spawn(async move { dsr_listener.run().await }));

    // --- Neighbor liveness (spec.md §4.6-§4.7) -----------------------------
    let live_socket = Arc::new(bind_broadcast_udp("live", ports::PORT_LIVE).await?);
    let neighbor_table = Arc::new(NeighborTable::new());

    let live_broadcaster = LiveBroadcaster::new(
        config.my_ip,
        config.position,
        live_socket.clone(),
        BroadcastTarget::Address(broadcast_addr(ports::PORT_LIVE)),
        LIVE_BROADCAST_INTERVAL,
        stoppable.clone(),
    );
    tasks.push(tokio::spawn(async move { live_broadcaster.run().await }));

    let live_listener = LiveListener::new(config.my_ip, live_socket, neighbor_table.clone(), stoppable.clone());
    tasks.push(tokio::spawn(async move { live_listener.run().await }));

    {
        let neighbor_table = neighbor_table.clone();
        let stoppable = stoppable.clone();
        tasks.push(tokio::spawn(async move {
            neighbor_table.run_expiry(NEIGHBOR_TABLE_TIMEOUT, &stoppable).await
        }));
    }

    // --- Sink-only topology aggregation (spec.md §4.9-§4.11) --------------
    let is_sink = config.is_sink();
    let topo_graph = if is_sink { Some(Arc::new(TopoGraph::new())) } else { None };

    if let Some(graph) = topo_graph.clone() {
        let stoppable = stoppable.clone();
        tasks.push(tokio::spawn(async move { graph.run_eviction(TOPO_EDGE_TIMEOUT, &stoppable).await }));

        // Reports go out on their own ephemeral-port socket; commands come
        // in on the well-known SDN port. Two sockets rather than one shared
        // handle, since `SdnListener` owns its socket outright.
        let sdn_report_socket = Arc::new(bind_udp("sdn report", 0).await?);
        let controller_addr = SocketAddr::new(Ipv4Addr::from(config.controller_ip).into(), ports::PORT_SDN);
        let sdn_reporter = SdnReporter::new(
            graph,
            config.sink_ip,
            config.position,
            sdn_report_socket,
            controller_addr,
            SDN_REPORT_INTERVAL,
            stoppable.clone(),
        );
        tasks.push(tokio::spawn(async move { sdn_reporter.run().await }));

        let sdn_command_socket = bind_udp("sdn command", ports::PORT_SDN).await?;
        let sdn_listener = SdnListener::new(sdn_command_socket, stoppable.clone());
        tasks.push(tokio::spawn(async move { sdn_listener.run().await }));
    }

    // --- Neighbor reports relayed toward the sink (spec.md §4.8-§4.9) -----
    let neib_report_listener = TcpListener::bind(("0.0.0.0", ports::PORT_NEIB_REPORT))
        .await
        .map_err(|source| BootstrapError::Bind {
            purpose: "neighbor report",
            addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), ports::PORT_NEIB_REPORT),
            source,
        })?;

    let disposition = match topo_graph.as_ref() {
        Some(graph) => ReportDisposition::Ingest(as_ingest(graph)),
        None => ReportDisposition::Relay {
            sink_ip: config.sink_ip,
            resolver: dsr_resolver.clone(),
            report_port: ports::PORT_NEIB_REPORT,
        },
    };
    let neighbor_listener = NeighborListener::new(neib_report_listener, disposition, stoppable.clone());
    tasks.push(tokio::spawn(async move { neighbor_listener.run().await }));

    let sink_ingest: Option<Arc<dyn TopologyIngest>> = topo_graph.as_ref().map(as_ingest);
    let neighbor_reporter = NeighborReporter::new(
        config.my_ip,
        config.position,
        config.sink_ip,
        is_sink,
        neighbor_table,
        dsr_resolver.clone(),
        ports::PORT_NEIB_REPORT,
        NEIGHBOR_REPORT_INTERVAL,
        stoppable.clone(),
        sink_ingest,
    );
    tasks.push(tokio::spawn(async move { neighbor_reporter.run().await }));

    // --- Video transport control plane (spec.md §4.12-§4.13) --------------
    let video_socket = Arc::new(bind_udp("video trans", ports::PORT_VIDEO_TRANS_PKT).await?);
    let (send_tx, send_rx) = mpsc::unbounded_channel();
    let (recv_tx, recv_rx) = mpsc::unbounded_channel();

    {
        let video_socket = video_socket.clone();
        tasks.push(tokio::spawn(async move { queues::send_loop(video_socket, ports::PORT_VIDEO_TRANS_PKT, send_rx).await }));
    }
    {
        let video_socket = video_socket.clone();
        let stoppable = stoppable.clone();
        tasks.push(tokio::spawn(async move { queues::recv_loop(video_socket, stoppable, recv_tx).await }));
    }

    let video_ctrler = Arc::new(VideoTransCtrler::new(
        config.my_ip,
        is_sink,
        config.sink_ip_to_controller,
        dsr_resolver,
        Arc::new(PublishingList::new()),
        Arc::new(LostList::new()),
        Arc::new(NullRelayerEngine),
        send_tx,
        stoppable.clone(),
    ));
    tasks.push(tokio::spawn(async move { video_ctrler.run(recv_rx).await }));

    Ok(RunningNode { stoppable, tasks })
}

async fn bind_udp(purpose: &'static str, port: u16) -> Result<UdpSocket, BootstrapError> {
    let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port);
    UdpSocket::bind(addr).await.map_err(|source| BootstrapError::Bind { purpose, addr, source })
}

async fn bind_broadcast_udp(purpose: &'static str, port: u16) -> Result<UdpSocket, BootstrapError> {
    let socket = bind_udp(purpose, port).await?;
    socket
        .set_broadcast(true)
        .map_err(|source| BootstrapError::Broadcast { purpose, source })?;
    Ok(socket)
}

/// `TopoGraph` already implements `TopologyIngest`; this just names the
/// unsizing coercion from `&Arc<TopoGraph>` to `Arc<dyn TopologyIngest>`
/// so call sites don't need the cast spelled out inline.
fn as_ingest(graph: &Arc<TopoGraph>) -> Arc<dyn TopologyIngest> {
    graph.clone()
}
