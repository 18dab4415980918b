use crate::ip::NodeIp;
use thiserror::Error;

/// Wire-level parse failure (spec.md §7 `MalformedPacket`). Dropped with a
/// log by the caller; never propagated past the codec boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed packet: {reason}")]
    MalformedPacket { reason: &'static str },
}

/// Errors that can cross the DSR resolver's public API boundary
/// (spec.md §7). `DestinationUnreachable` is the only one resolver callers
/// ever see; `ParamInvalid` is a programmer error and is fatal for the call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route to {0}")]
    DestinationUnreachable(NodeIp),
    #[error("invalid resolver parameter: {0}")]
    ParamInvalid(&'static str),
}

/// Socket bind/connect/send failures. The calling loop logs and continues
/// (spec.md §7); these never panic the process.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),
}

/// A relayer's heartbeat exceeded `RELAY_TIMEOUT_MS` (spec.md §7
/// `RelayerStallTimeout`). Surfaced to the sweeper, which unblocks the
/// relayer task; the task's own exit path marks the stream's URL lost.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("relayer for {url} stalled past {timeout_ms}ms")]
pub struct RelayerStallTimeout {
    pub url: String,
    pub timeout_ms: u64,
}
