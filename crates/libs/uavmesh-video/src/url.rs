//! Video pull/publish URL convention (spec.md §6): `rtsp://<publishIP>:8554/vs<NN>`
//! where `NN` is the capturer's last octet modulo 100, zero-padded to two
//! decimal digits — matching `original_source/video_stream.cpp`'s
//! `num%10` then `/10` digit extraction, which only ever emits two
//! digits. `generate_url`/`split_url` are inverses modulo the
//! `192.168.2.1XX` subnet assumption baked into the original source's
//! `splitUrl`.

use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;
use uavmesh_core::ports::PORT_VIDEO;
use uavmesh_core::NodeIp;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed video url: {0}")]
pub struct UrlParseError(pub String);

pub fn generate_url(capturer_ip: NodeIp, publish_ip: NodeIp) -> String {
    let publish_addr = Ipv4Addr::from(publish_ip);
    format!("rtsp://{publish_addr}:{PORT_VIDEO}/vs{:02}", capturer_ip.last_octet() % 100)
}

/// Recovers `(capturer_ip, publish_ip)` from a URL produced by
/// [`generate_url`]. The capturer's IP is reconstructed as
/// `192.168.2.1<NN>`, mirroring the original source's subnet assumption
/// rather than carrying the full capturer address on the wire.
pub fn split_url(url: &str) -> Result<(NodeIp, NodeIp), UrlParseError> {
    let rest = url.strip_prefix("rtsp://").ok_or_else(|| UrlParseError(url.to_string()))?;
    let (host, path) = rest.split_once(':').ok_or_else(|| UrlParseError(url.to_string()))?;
    let publish_ip =
        NodeIp::from_str(host).map_err(|_| UrlParseError(url.to_string()))?;

    let suffix = path.rsplit("/vs").next().ok_or_else(|| UrlParseError(url.to_string()))?;
    if suffix.len() != 2 {
        return Err(UrlParseError(url.to_string()));
    }
    let last_octet: u8 = suffix.parse().map_err(|_| UrlParseError(url.to_string()))?;
    let capturer_ip = NodeIp::from(Ipv4Addr::new(192, 168, 2, 100 + last_octet));

    Ok((capturer_ip, publish_ip))
}
