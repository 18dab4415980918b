//! SDN command listener (spec.md §4.11, sink only): UDP commands from the
//! external controller, `"node<K>"` to start video at node `K` and
//! `"End<K>"` to stop it.
//!
//! The original source checks `strstr(buf, "node") == 0`, which actually
//! means "does NOT contain node" (`strstr` returns a null pointer, not an
//! offset, on no match) — a bug the spec's Open Questions call out
//! explicitly. This listener implements the obviously-intended behavior:
//! a *prefix* match against `"node"` / `"End"`.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use uavmesh_core::{NodeIp, Stoppable};

const SDN_CMD_MAX_LEN: usize = 64;
const NETWORK_PREFIX: [u8; 3] = [192, 168, 2];
/// `numstr2IP`'s `+99` offset from command index to last-octet value.
const NODE_INDEX_OFFSET: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdnCommand {
    StartVideo(NodeIp),
    EndVideo(NodeIp),
    Unknown,
}

/// Parses one SDN command datagram. `buf` is the UTF-8 text received,
/// trailing `\n`/`\r` are trimmed first.
pub fn parse_command(buf: &str) -> SdnCommand {
    let trimmed = buf.trim_end_matches(['\n', '\r']);

    if let Some(rest) = trimmed.strip_prefix("node") {
        return match rest.trim().parse::<u8>() {
            Ok(index) => SdnCommand::StartVideo(node_index_to_ip(index)),
            Err(_) => SdnCommand::Unknown,
        };
    }
    if let Some(rest) = trimmed.strip_prefix("End") {
        return match rest.trim().parse::<u8>() {
            Ok(index) => SdnCommand::EndVideo(node_index_to_ip(index)),
            Err(_) => SdnCommand::Unknown,
        };
    }
    SdnCommand::Unknown
}

fn node_index_to_ip(index: u8) -> NodeIp {
    let last_octet = index.wrapping_add(NODE_INDEX_OFFSET);
    NodeIp::from(Ipv4Addr::new(NETWORK_PREFIX[0], NETWORK_PREFIX[1], NETWORK_PREFIX[2], last_octet))
}

pub struct SdnListener {
    socket: UdpSocket,
    stoppable: Arc<Stoppable>,
}

impl SdnListener {
    pub fn new(socket: UdpSocket, stoppable: Arc<Stoppable>) -> Self {
        SdnListener { socket, stoppable }
    }

    /// Receives SDN commands until stopped, logging the decoded command.
    /// Callers that need to act on `StartVideo`/`EndVideo` (spec.md §4.13)
    /// should use [`SdnListener::recv_command`] directly instead, wiring
    /// the result into `VideoTransCtrler`.
    pub async fn run(&self) {
        loop {
            match self.recv_command().await {
                Some(SdnCommand::StartVideo(ip)) => log::info!("SDN command: start video at {ip}"),
                Some(SdnCommand::EndVideo(ip)) => log::info!("SDN command: end video at {ip}"),
                Some(SdnCommand::Unknown) => log::warn!("unknown SDN command type"),
                None => return,
            }
        }
    }

    /// Returns `None` once stop has been requested.
    pub async fn recv_command(&self) -> Option<SdnCommand> {
        let mut buf = [0u8; SDN_CMD_MAX_LEN];
        loop {
            tokio::select! {
                _ = self.stoppable.wait_for_stop() => return None,
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((n, _src)) => {
                            let text = String::from_utf8_lossy(&buf[..n]);
                            return Some(parse_command(&text));
                        }
                        Err(err) => {
                            log::warn!("sdn listener: recv failed: {err}");
                            continue;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_video_prefix() {
        assert_eq!(parse_command("node2\n"), SdnCommand::StartVideo("192.168.2.101".parse().unwrap()));
    }

    #[test]
    fn parses_end_video_prefix() {
        assert_eq!(parse_command("End2"), SdnCommand::EndVideo("192.168.2.101".parse().unwrap()));
    }

    #[test]
    fn unknown_command_is_unknown() {
        assert_eq!(parse_command("garbage"), SdnCommand::Unknown);
    }

    #[test]
    fn non_numeric_suffix_is_unknown() {
        assert_eq!(parse_command("nodeX"), SdnCommand::Unknown);
    }
}
