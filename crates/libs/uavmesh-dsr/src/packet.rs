//! DSR request/response wire codec (spec.md §4.1).
//!
//! Layout: 1-byte type, then five big-endian u32 fields (`src`, `dst`,
//! `hop`, `req_id`, `route_len`), then `route_len` big-endian u32 IPs.
//! Header is fixed at 21 bytes; total length is `21 + 4 * route_len`.

use uavmesh_core::wire::{read_u32, write_u32};
use uavmesh_core::{NodeIp, WireError};

pub const DSR_HEADER_LEN: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsrPacketType {
    Request,
    Response,
}

impl DsrPacketType {
    fn to_byte(self) -> u8 {
        match self {
            DsrPacketType::Request => 1,
            DsrPacketType::Response => 2,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, WireError> {
        match byte {
            1 => Ok(DsrPacketType::Request),
            2 => Ok(DsrPacketType::Response),
            _ => Err(WireError::MalformedPacket { reason: "unknown dsr packet type" }),
        }
    }
}

/// One request or response frame, including the accumulated route list
/// (spec.md §3 `DsrRoutePacket`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsrRoutePacket {
    pub pkt_type: DsrPacketType,
    pub src: NodeIp,
    pub dst: NodeIp,
    pub hop: u32,
    pub req_id: u32,
    pub route: Vec<NodeIp>,
}

impl DsrRoutePacket {
    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < DSR_HEADER_LEN {
            return Err(WireError::MalformedPacket { reason: "buffer shorter than dsr header" });
        }
        let pkt_type = DsrPacketType::from_byte(buf[0])?;
        let src = NodeIp::from_be_bytes(read_u32(buf, 1)?.to_be_bytes());
        let dst = NodeIp::from_be_bytes(read_u32(buf, 5)?.to_be_bytes());
        let hop = read_u32(buf, 9)?;
        let req_id = read_u32(buf, 13)?;
        let route_len = read_u32(buf, 17)? as usize;

        let expected_len = DSR_HEADER_LEN + 4 * route_len;
        if buf.len() < expected_len {
            return Err(WireError::MalformedPacket { reason: "buffer shorter than route_len implies" });
        }

        let mut route = Vec::with_capacity(route_len);
        for i in 0..route_len {
            let offset = DSR_HEADER_LEN + 4 * i;
            route.push(NodeIp::from_be_bytes(read_u32(buf, offset)?.to_be_bytes()));
        }

        Ok(DsrRoutePacket { pkt_type, src, dst, hop, req_id, route })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let len = DSR_HEADER_LEN + 4 * self.route.len();
        let mut buf = vec![0u8; len];
        buf[0] = self.pkt_type.to_byte();
        write_u32(&mut buf, 1, u32::from_be_bytes(self.src.to_be_bytes()));
        write_u32(&mut buf, 5, u32::from_be_bytes(self.dst.to_be_bytes()));
        write_u32(&mut buf, 9, self.hop);
        write_u32(&mut buf, 13, self.req_id);
        write_u32(&mut buf, 17, self.route.len() as u32);
        for (i, ip) in self.route.iter().enumerate() {
            let offset = DSR_HEADER_LEN + 4 * i;
            write_u32(&mut buf, offset, u32::from_be_bytes(ip.to_be_bytes()));
        }
        buf
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
    fn round_trips_request_with_route() {
        let pkt = DsrRoutePacket {
            pkt_type: DsrPacketType::Request,
            src: ip("192.168.2.100"),
            dst: ip("192.168.2.102"),
            hop: 2,
            req_id: 7,
            route: vec![ip("192.168.2.100"), ip("192.168.2.101")],
        };
        let buf = pkt.serialize();
        assert_eq!(buf.len(), DSR_HEADER_LEN + 8);
        assert_eq!(DsrRoutePacket::parse(&buf).unwrap(), pkt);
    }

    #[test]
    fn round_trips_empty_route_response() {
        let pkt = DsrRoutePacket {
            pkt_type: DsrPacketType::Response,
            src: ip("10.0.0.1"),
            dst: ip("10.0.0.2"),
            hop: 1,
            req_id: 1,
            route: vec![],
        };
        let buf = pkt.serialize();
        assert_eq!(buf.len(), DSR_HEADER_LEN);
        assert_eq!(DsrRoutePacket::parse(&buf).unwrap(), pkt);
    }

    #[test]
    fn short_buffer_is_malformed() {
        let buf = [0u8; 10];
        assert!(DsrRoutePacket::parse(&buf).is_err());
    }

    #[test]
    fn route_len_past_buffer_is_malformed() {
        let mut pkt = DsrRoutePacket {
            pkt_type: DsrPacketType::Request,
            src: ip("10.0.0.1"),
            dst: ip("10.0.0.2"),
            hop: 1,
            req_id: 1,
            route: vec![ip("10.0.0.1")],
        }
        .serialize();
        // Claim a longer route than the buffer actually carries.
        write_u32(&mut pkt, 17, 5);
        assert!(DsrRoutePacket::parse(&pkt).is_err());
    }

    #[test]
    fn unknown_type_byte_is_malformed() {
        let mut buf = vec![0u8; DSR_HEADER_LEN];
        buf[0] = 99;
        assert!(DsrRoutePacket::parse(&buf).is_err());
    }
}
