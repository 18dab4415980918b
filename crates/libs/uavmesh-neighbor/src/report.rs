//! `NeighborReport` wire codec (spec.md §3, §4.8): a 4-byte big-endian
//! neighbor count, one 68-byte sender `LivePacket`, then `count` 68-byte
//! neighbor `LivePacket`s. Header is 72 bytes; total is capped at 800
//! bytes by the caller (spec.md §4.8 "oversize reports are dropped").

use uavmesh_core::wire::{read_u32, write_u32};
use uavmesh_core::{NodeIp, Position, WireError};

use crate::live_packet::{LivePacket, LIVE_PKT_LEN};

pub const NEIB_PKT_HEADER_LEN: usize = 4 + LIVE_PKT_LEN;
pub const NEIB_PKT_MAX_LEN: usize = 800;

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborReport {
    pub sender: NodeIp,
    pub sender_position: Position,
    pub neighbors: Vec<LivePacket>,
}

/// Returned when a report would exceed `NEIB_PKT_MAX_LEN` on the wire
/// (spec.md §4.8). The caller drops the send and logs; this is not a
/// `WireError` since it never reaches the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("neighbor report ({len} bytes) exceeds the {max} byte cap")]
pub struct ReportTooLarge {
    pub len: usize,
    pub max: usize,
}

impl NeighborReport {
    pub fn serialize(&self) -> Result<Vec<u8>, ReportTooLarge> {
        let len = NEIB_PKT_HEADER_LEN + LIVE_PKT_LEN * self.neighbors.len();
        if len > NEIB_PKT_MAX_LEN {
            return Err(ReportTooLarge { len, max: NEIB_PKT_MAX_LEN });
        }
        let mut buf = vec![0u8; len];
        write_u32(&mut buf, 0, self.neighbors.len() as u32);
        buf[4..4 + LIVE_PKT_LEN].copy_from_slice(&LivePacket::new(self.sender, self.sender_position).serialize());
        for (i, neighbor) in self.neighbors.iter().enumerate() {
            let offset = NEIB_PKT_HEADER_LEN + i * LIVE_PKT_LEN;
            buf[offset..offset + LIVE_PKT_LEN].copy_from_slice(&neighbor.serialize());
        }
        Ok(buf)
    }

    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < NEIB_PKT_HEADER_LEN {
            return Err(WireError::MalformedPacket { reason: "buffer shorter than neighbor report header" });
        }
        let count = read_u32(buf, 0)? as usize;
        let expected_len = NEIB_PKT_HEADER_LEN + LIVE_PKT_LEN * count;
        if buf.len() < expected_len {
            return Err(WireError::MalformedPacket { reason: "buffer shorter than neighbor count implies" });
        }
        let sender_pkt = LivePacket::parse(&buf[4..4 + LIVE_PKT_LEN])?;
        let mut neighbors = Vec::with_capacity(count);
        for i in 0..count {
            let offset = NEIB_PKT_HEADER_LEN + i * LIVE_PKT_LEN;
            neighbors.push(LivePacket::parse(&buf[offset..offset + LIVE_PKT_LEN])?);
        }
        Ok(NeighborReport { sender: sender_pkt.ip, sender_position: sender_pkt.position, neighbors })
    }

    /// Total size this report would occupy on the wire, without
    /// allocating a buffer. Used by callers deciding whether to retry
    /// with a trimmed neighbor list.
    pub fn wire_len(&self) -> usize {
        NEIB_PKT_HEADER_LEN + LIVE_PKT_LEN * self.neighbors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ip(s: &str) -> NodeIp {
        NodeIp::from_str(s).unwrap()
    }

    #[test]
    fn round_trips_with_neighbors() {
        let report = NeighborReport {
            sender: ip("192.168.2.101"),
            sender_position: Position::new(1.0, 2.0),
            neighbors: vec![LivePacket::new(ip("192.168.2.102"), Position::new(3.0, 4.0))],
        };
        let buf = report.serialize().unwrap();
        assert_eq!(buf.len(), NEIB_PKT_HEADER_LEN + LIVE_PKT_LEN);
        assert_eq!(NeighborReport::parse(&buf).unwrap(), report);
    }

    #[test]
    fn round_trips_with_no_neighbors() {
        let report = NeighborReport { sender: ip("10.0.0.1"), sender_position: Position::new(0.0, 0.0), neighbors: vec![] };
        let buf = report.serialize().unwrap();
        assert_eq!(buf.len(), NEIB_PKT_HEADER_LEN);
        assert_eq!(NeighborReport::parse(&buf).unwrap(), report);
    }

    #[test]
    fn oversize_report_is_rejected_before_serializing() {
        let neighbors = (0..20)
            .map(|i| LivePacket::new(ip(&format!("192.168.2.{}", 100 + i)), Position::new(0.0, 0.0)))
            .collect();
        let report = NeighborReport { sender: ip("192.168.2.1"), sender_position: Position::new(0.0, 0.0), neighbors };
        assert!(report.serialize().is_err());
    }
}
