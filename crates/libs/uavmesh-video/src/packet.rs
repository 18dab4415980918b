//! `VideoTransPacket` (spec.md §4.12): the 17-byte control record carried
//! hop-by-hop over `PORT_VIDEO_TRANS_PKT` (spec.md §6).

use uavmesh_core::wire::{read_u32, write_u32};
use uavmesh_core::{NodeIp, WireError};

pub const VIDEO_TRANS_PKT_LEN: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoTransCmd {
    Unknown,
    Start,
    Ready,
    Stop,
    Lost,
}

impl VideoTransCmd {
    fn to_byte(self) -> u8 {
        match self {
            VideoTransCmd::Unknown => 0,
            VideoTransCmd::Start => 1,
            VideoTransCmd::Ready => 2,
            VideoTransCmd::Stop => 4,
            VideoTransCmd::Lost => 8,
        }
    }

    /// Unrecognized values parse as `Unknown` (spec.md §4.12) rather than
    /// erroring — the controller ignores them instead of rejecting the
    /// packet outright.
    fn from_byte(byte: u8) -> Self {
        match byte {
            1 => VideoTransCmd::Start,
            2 => VideoTransCmd::Ready,
            4 => VideoTransCmd::Stop,
            8 => VideoTransCmd::Lost,
            _ => VideoTransCmd::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoTransPacket {
    pub cmd: VideoTransCmd,
    pub src: NodeIp,
    pub dst: NodeIp,
    pub requester: NodeIp,
    pub capturer: NodeIp,
}

impl VideoTransPacket {
    pub fn new(cmd: VideoTransCmd, src: NodeIp, dst: NodeIp, requester: NodeIp, capturer: NodeIp) -> Self {
        VideoTransPacket { cmd, src, dst, requester, capturer }
    }

    pub fn serialize(&self) -> [u8; VIDEO_TRANS_PKT_LEN] {
        let mut buf = [0u8; VIDEO_TRANS_PKT_LEN];
        buf[0] = self.cmd.to_byte();
        write_u32(&mut buf, 1, self.src.0);
        write_u32(&mut buf, 5, self.dst.0);
        write_u32(&mut buf, 9, self.requester.0);
        write_u32(&mut buf, 13, self.capturer.0);
        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < VIDEO_TRANS_PKT_LEN {
            return Err(WireError::MalformedPacket { reason: "video trans packet shorter than 17 bytes" });
        }
        Ok(VideoTransPacket {
            cmd: VideoTransCmd::from_byte(buf[0]),
            src: NodeIp(read_u32(buf, 1)?),
            dst: NodeIp(read_u32(buf, 5)?),
            requester: NodeIp(read_u32(buf, 9)?),
            capturer: NodeIp(read_u32(buf, 13)?),
        })
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
    fn round_trips_through_wire_bytes() {
        let pkt = VideoTransPacket::new(
            VideoTransCmd::Ready,
            ip("192.168.2.100"),
            ip("192.168.2.101"),
            ip("192.168.2.100"),
            ip("192.168.2.102"),
        );
        let buf = pkt.serialize();
        assert_eq!(buf.len(), VIDEO_TRANS_PKT_LEN);
        assert_eq!(VideoTransPacket::parse(&buf).unwrap(), pkt);
    }

    #[test]
    fn unrecognized_cmd_byte_parses_as_unknown() {
        let mut buf = [0u8; VIDEO_TRANS_PKT_LEN];
        buf[0] = 99;
        let pkt = VideoTransPacket::parse(&buf).unwrap();
        assert_eq!(pkt.cmd, VideoTransCmd::Unknown);
    }

    #[test]
    fn short_buffer_is_malformed() {
        let buf = [0u8; 10];
        assert!(VideoTransPacket::parse(&buf).is_err());
    }
}
