//! Send/receive plumbing for `VideoTransPacket` (spec.md §4.13's
//! `PacketSendQueue`/`PacketRecvQueue`). The original source backs each
//! queue with its own mutex + condvar; an `mpsc` channel gives the same
//! "producer pushes, consumer drains, shutdown drains what's left"
//! behavior for free, so that's what's used here instead of hand-rolling
//! a queue.

use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use uavmesh_core::Stoppable;

use crate::packet::{VideoTransPacket, VIDEO_TRANS_PKT_LEN};

/// Drains `rx` and UDP-sends each packet to its `dst`, until every sender
/// handle is dropped. Matches `PacketSendQueue::run`'s "finish sending
/// what's queued, then exit" shutdown behavior without an explicit drain
/// loop: `recv()` returns `None` only once the channel is both closed and
/// empty.
pub async fn send_loop(socket: Arc<UdpSocket>, port: u16, mut rx: mpsc::UnboundedReceiver<VideoTransPacket>) {
    while let Some(pkt) = rx.recv().await {
        let buf = pkt.serialize();
        let addr = (std::net::Ipv4Addr::from(pkt.dst), port);
        if let Err(err) = socket.send_to(&buf, addr).await {
            log::warn!("video trans send to {} failed: {err}", pkt.dst);
        }
    }
}

/// Receives `VideoTransPacket`s until `stoppable` is tripped, forwarding
/// each parsed packet onto `tx`. Malformed datagrams are logged and
/// dropped (spec.md §7).
pub async fn recv_loop(socket: Arc<UdpSocket>, stoppable: Arc<Stoppable>, tx: mpsc::UnboundedSender<VideoTransPacket>) {
    let mut buf = [0u8; VIDEO_TRANS_PKT_LEN + 16];
    loop {
        tokio::select! {
            _ = stoppable.wait_for_stop() => return,
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((n, _from)) => match VideoTransPacket::parse(&buf[..n]) {
                        Ok(pkt) => {
                            if tx.send(pkt).is_err() {
                                return;
                            }
                        }
                        Err(err) => log::warn!("dropping malformed video trans packet: {err}"),
                    },
                    Err(err) => log::warn!("video trans recv failed: {err}"),
                }
            }
        }
    }
}
