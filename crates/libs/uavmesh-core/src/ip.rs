use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A 32-bit IPv4 address stored in host byte order.
///
/// Wire codecs convert to/from big-endian explicitly at the packet boundary
/// (spec.md §3); everywhere else in the process the address is just a plain
/// value, matching the source's `in_addr_t` usage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeIp(pub u32);

impl NodeIp {
    pub const UNSPECIFIED: NodeIp = NodeIp(0);

    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        NodeIp(u32::from_be_bytes(bytes))
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Last octet, used by the SDN frame's compact node-id encoding
    /// (spec.md §4.11) and by the video URL octet convention (spec.md §6).
    pub fn last_octet(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl From<Ipv4Addr> for NodeIp {
    fn from(addr: Ipv4Addr) -> Self {
        NodeIp(u32::from(addr))
    }
}

impl From<NodeIp> for Ipv4Addr {
    fn from(ip: NodeIp) -> Self {
        Ipv4Addr::from(ip.0)
    }
}

impl FromStr for NodeIp {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4Addr::from_str(s.trim()).map(NodeIp::from)
    }
}

impl fmt::Display for NodeIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Ipv4Addr::from(*self))
    }
}

impl fmt::Debug for NodeIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeIp({})", Ipv4Addr::from(*self))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 100.0, y: 100.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_octet_matches_dotted_quad() {
        let ip: NodeIp = "192.168.2.101".parse().unwrap();
        assert_eq!(ip.last_octet(), 101);
    }

    #[test]
    fn be_bytes_round_trip() {
        let ip: NodeIp = "10.0.0.1".parse().unwrap();
        assert_eq!(NodeIp::from_be_bytes(ip.to_be_bytes()), ip);
    }

    #[test]
    fn display_renders_dotted_quad() {
        let ip: NodeIp = "192.168.2.100".parse().unwrap();
        assert_eq!(ip.to_string(), "192.168.2.100");
    }
}
