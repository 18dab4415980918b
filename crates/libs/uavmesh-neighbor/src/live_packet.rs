//! `LivePacket` wire codec (spec.md §3): 4-byte big-endian IP followed by
//! two zero-padded 32-byte ASCII decimal fields for `posX`/`posY`. Fixed
//! 68 bytes total, shared verbatim as the "sender record" / "neighbor
//! record" unit inside `NeighborReport` (spec.md §3, §4.8).

use uavmesh_core::wire::{decode_ascii_double, encode_ascii_double, read_u32, write_u32};
use uavmesh_core::{NodeIp, Position, WireError};

pub const LIVE_PKT_LEN: usize = 68;
const POS_FIELD_WIDTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivePacket {
    pub ip: NodeIp,
    pub position: Position,
}

impl LivePacket {
    pub fn new(ip: NodeIp, position: Position) -> Self {
        LivePacket { ip, position }
    }

    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < LIVE_PKT_LEN {
            return Err(WireError::MalformedPacket { reason: "buffer shorter than live packet" });
        }
        let ip = NodeIp::from_be_bytes(read_u32(buf, 0)?.to_be_bytes());
        let x = decode_ascii_double(&buf[4..4 + POS_FIELD_WIDTH])?;
        let y = decode_ascii_double(&buf[4 + POS_FIELD_WIDTH..4 + 2 * POS_FIELD_WIDTH])?;
        Ok(LivePacket { ip, position: Position::new(x, y) })
    }

    pub fn serialize(&self) -> [u8; LIVE_PKT_LEN] {
        let mut buf = [0u8; LIVE_PKT_LEN];
        write_u32(&mut buf, 0, u32::from_be_bytes(self.ip.to_be_bytes()));
        buf[4..4 + POS_FIELD_WIDTH].copy_from_slice(&encode_ascii_double(self.position.x, POS_FIELD_WIDTH));
        buf[4 + POS_FIELD_WIDTH..4 + 2 * POS_FIELD_WIDTH]
            .copy_from_slice(&encode_ascii_double(self.position.y, POS_FIELD_WIDTH));
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips() {
        let pkt = LivePacket::new(NodeIp::from_str("192.168.2.103").unwrap(), Position::new(1.5, -2.25));
        let buf = pkt.serialize();
        assert_eq!(buf.len(), LIVE_PKT_LEN);
        assert_eq!(LivePacket::parse(&buf).unwrap(), pkt);
    }

    #[test]
    fn short_buffer_is_malformed() {
        let buf = [0u8; 10];
        assert!(LivePacket::parse(&buf).is_err());
    }
}
