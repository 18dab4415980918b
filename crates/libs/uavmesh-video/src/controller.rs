//! `VideoTransCtrler` (spec.md §4.13): the video-transport control plane —
//! reacts to `start`/`ready`/`stop`/`lost` control packets, spawns/reaps
//! relayer tasks along the discovered path, and retries lost streams.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use uavmesh_core::{NodeIp, Stoppable};
use uavmesh_dsr::{DsrResolver, ResolveMode};

use crate::lists::{LostList, PublishingList};
use crate::packet::{VideoTransCmd, VideoTransPacket};
use crate::relayer::{RelayerEngine, RelayerHandle, RELAY_TIMEOUT_MS};
use crate::url::generate_url;

const ROUTE_TIMEOUT: Duration = Duration::from_secs(10);
/// The retry loop resolves with a shorter timeout than `packetReact`
/// (spec.md §4.13's retry loop vs. `getNextHop(..., 5, ...)` in
/// `original_source/video_stream.cpp`).
const RETRY_ROUTE_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_INTERVAL: Duration = Duration::from_secs(1);
const SWEEP_INTERVAL: Duration = Duration::from_secs(3);
const PUBLISH_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct VideoTransCtrler {
    my_ip: NodeIp,
    is_sink: bool,
    /// Where a sink node republishes toward the external controller
    /// (`config.sinkIP2Ctrler`); irrelevant for non-sink nodes, which
    /// always republish to themselves.
    sink_ip_to_controller: NodeIp,
    resolver: Arc<DsrResolver>,
    publishing: Arc<PublishingList>,
    lost: Arc<LostList>,
    relayers: Mutex<HashMap<NodeIp, RelayerHandle>>,
    engine: Arc<dyn RelayerEngine>,
    send_tx: mpsc::UnboundedSender<VideoTransPacket>,
    stoppable: Arc<Stoppable>,
    relay_timeout_ms: u64,
}

impl VideoTransCtrler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        my_ip: NodeIp,
        is_sink: bool,
        sink_ip_to_controller: NodeIp,
        resolver: Arc<DsrResolver>,
        publishing: Arc<PublishingList>,
        lost: Arc<LostList>,
        engine: Arc<dyn RelayerEngine>,
        send_tx: mpsc::UnboundedSender<VideoTransPacket>,
        stoppable: Arc<Stoppable>,
    ) -> Self {
        VideoTransCtrler {
            my_ip,
            is_sink,
            sink_ip_to_controller,
            resolver,
            publishing,
            lost,
            relayers: Mutex::new(HashMap::new()),
            engine,
            send_tx,
            stoppable,
            relay_timeout_ms: RELAY_TIMEOUT_MS,
        }
    }

    fn republish_ip(&self) -> NodeIp {
        if self.is_sink {
            self.sink_ip_to_controller
        } else {
            self.my_ip
        }
    }

    /// Runs the receive-handling loop, the lost-stream retry loop, and the
    /// heartbeat sweeper concurrently until stopped (spec.md §4.13: "Runs
    /// three cooperating tasks").
    pub async fn run(self: Arc<Self>, mut recv_rx: mpsc::UnboundedReceiver<VideoTransPacket>) {
        let handler = {
            let this = self.clone();
            tokio::spawn(async move {
                while let Some(pkt) = recv_rx.recv().await {
                    this.packet_react(pkt).await;
                }
            })
        };

        let retryer = {
            let this = self.clone();
            tokio::spawn(async move { this.retry_loop().await })
        };

        let sweeper = {
            let this = self.clone();
            tokio::spawn(async move { this.sweep_loop().await })
        };

        self.stoppable.wait_for_stop().await;
        let _ = tokio::join!(handler, retryer, sweeper);
    }

    async fn retry_loop(&self) {
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => return,
                _ = tokio::time::sleep(RETRY_INTERVAL) => {}
            }

            let Some(lost_url) = self.lost.pop_any() else { continue };
            let Ok((capturer_ip, _publish_ip)) = crate::url::split_url(&lost_url) else {
                log::warn!("lost list contained an unparseable url: {lost_url}");
                continue;
            };

            self.delete_relayer(capturer_ip).await;

            if !self.is_sink {
                continue;
            }

            while self.publishing.contains(&lost_url) {
                log::info!("lost link relayer has not exited yet, waiting...");
                tokio::time::sleep(PUBLISH_POLL_INTERVAL).await;
            }

            let next_hop = match self.resolver.get_next_hop(capturer_ip, RETRY_ROUTE_TIMEOUT, ResolveMode::SendReqAnyway).await {
                Ok(hop) => hop,
                Err(err) => {
                    log::warn!("retry: no route to {capturer_ip}: {err}");
                    continue;
                }
            };

            let pkt = VideoTransPacket::new(VideoTransCmd::Start, self.my_ip, next_hop, self.my_ip, capturer_ip);
            let _ = self.send_tx.send(pkt);
        }
    }

    async fn sweep_loop(&self) {
        let mut last_tick = tokio::time::Instant::now();
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => return,
                _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
            }

            let now = tokio::time::Instant::now();
            let elapsed_ms = now.duration_since(last_tick).as_millis() as u64;
            last_tick = now;

            let mut timed_out = Vec::new();
            {
                let relayers = self.relayers.lock().await;
                for (&capturer_ip, handle) in relayers.iter() {
                    handle.record_heartbeat_tick(elapsed_ms);
                    if handle.is_stalled(self.relay_timeout_ms) {
                        handle.force_quit();
                        timed_out.push(capturer_ip);
                    }
                }
            }
            if !timed_out.is_empty() {
                let mut relayers = self.relayers.lock().await;
                for capturer_ip in timed_out {
                    relayers.remove(&capturer_ip);
                    log::info!("relayer for {capturer_ip} timed out, removed");
                }
            }
        }
    }

    async fn packet_react(&self, pkt: VideoTransPacket) {
        match pkt.cmd {
            VideoTransCmd::Start => self.react_start(pkt).await,
            VideoTransCmd::Ready => self.react_ready(pkt).await,
            VideoTransCmd::Stop => self.react_stop(pkt).await,
            VideoTransCmd::Lost => {}
            VideoTransCmd::Unknown => log::warn!("ignoring unknown video trans command"),
        }
    }

    async fn react_start(&self, pkt: VideoTransPacket) {
        let (next_hop, cmd_to_send) = if pkt.capturer == self.my_ip {
            match self.resolver.get_next_hop(pkt.requester, ROUTE_TIMEOUT, ResolveMode::SendReqAnyway).await {
                Ok(hop) => (hop, VideoTransCmd::Ready),
                Err(err) => {
                    log::warn!("start: no route to requester {}: {err}", pkt.requester);
                    return;
                }
            }
        } else {
            match self.resolver.get_next_hop(pkt.capturer, ROUTE_TIMEOUT, ResolveMode::SendReqAnyway).await {
                Ok(hop) => (hop, VideoTransCmd::Start),
                Err(err) => {
                    log::warn!("start: no route to capturer {}: {err}", pkt.capturer);
                    return;
                }
            }
        };

        if cmd_to_send == VideoTransCmd::Ready {
            let own_capture_url = generate_url(self.my_ip, self.my_ip);
            while !self.publishing.contains(&own_capture_url) {
                log::info!("local video stream is not ready yet, waiting...");
                tokio::time::sleep(PUBLISH_POLL_INTERVAL).await;
            }
        }

        let pkt_to_send = VideoTransPacket::new(cmd_to_send, self.my_ip, next_hop, pkt.requester, pkt.capturer);
        let _ = self.send_tx.send(pkt_to_send);
    }

    async fn react_ready(&self, pkt: VideoTransPacket) {
        self.add_relayer(pkt.capturer, pkt.src).await;

        let recovered_url = generate_url(pkt.capturer, self.republish_ip());
        if self.lost.contains(&recovered_url) {
            self.lost.remove(&recovered_url);
            log::info!("lost stream {recovered_url} recovered!");
        }

        if pkt.requester == self.my_ip {
            return;
        }

        let next_hop = match self.resolver.get_next_hop(pkt.requester, ROUTE_TIMEOUT, ResolveMode::SendReqAnyway).await {
            Ok(hop) => hop,
            Err(err) => {
                log::warn!("ready: no route to requester {}: {err}", pkt.requester);
                return;
            }
        };

        let relayed_url = generate_url(pkt.capturer, self.my_ip);
        while !self.publishing.contains(&relayed_url) {
            log::info!("relayed video stream is not ready yet, waiting...");
            tokio::time::sleep(PUBLISH_POLL_INTERVAL).await;
        }

        let pkt_to_send = VideoTransPacket::new(VideoTransCmd::Ready, self.my_ip, next_hop, pkt.requester, pkt.capturer);
        let _ = self.send_tx.send(pkt_to_send);
    }

    async fn react_stop(&self, pkt: VideoTransPacket) {
        if pkt.capturer == self.my_ip {
            return;
        }

        self.delete_relayer(pkt.capturer).await;

        let next_hop = match self.resolver.get_next_hop(pkt.capturer, ROUTE_TIMEOUT, ResolveMode::SendReqAnyway).await {
            Ok(hop) => hop,
            Err(err) => {
                log::warn!("stop: no route to capturer {}: {err}", pkt.capturer);
                return;
            }
        };

        if next_hop == pkt.capturer {
            return;
        }

        let relayed_url = generate_url(pkt.capturer, self.my_ip);
        while self.publishing.contains(&relayed_url) {
            log::info!("local relayer is still running, waiting...");
            tokio::time::sleep(PUBLISH_POLL_INTERVAL).await;
        }

        let pkt_to_send = VideoTransPacket::new(VideoTransCmd::Stop, self.my_ip, next_hop, pkt.requester, pkt.capturer);
        let _ = self.send_tx.send(pkt_to_send);
    }

    async fn add_relayer(&self, capturer_ip: NodeIp, pull_ip: NodeIp) {
        let mut relayers = self.relayers.lock().await;
        if relayers.contains_key(&capturer_ip) {
            log::info!("relayer pulling stream from {capturer_ip} already exists");
            return;
        }

        let pull_url = generate_url(capturer_ip, pull_ip);
        let publish_url = generate_url(capturer_ip, self.republish_ip());
        let handle = RelayerHandle::spawn(self.engine.clone(), pull_url, publish_url, self.publishing.clone(), self.lost.clone());
        relayers.insert(capturer_ip, handle);
    }

    async fn delete_relayer(&self, capturer_ip: NodeIp) {
        let handle = self.relayers.lock().await.remove(&capturer_ip);
        match handle {
            Some(handle) => {
                handle.stop().await;
            }
            None => log::info!("no relayer is pulling stream from {capturer_ip}, nothing deleted"),
        }
    }
}
