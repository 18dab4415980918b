//! Video-transport control plane (spec.md §4.12-§4.13): the
//! `VideoTransPacket` codec, the pull/publish URL convention,
//! `PublishingList`/`LostList`, the opaque relayer lifecycle, and
//! `VideoTransCtrler`'s request/ready/stop/lost state machine.

pub mod controller;
pub mod lists;
pub mod packet;
pub mod queues;
pub mod relayer;
pub mod url;

pub use controller::VideoTransCtrler;
pub use lists::{LostList, PublishingList, UrlSet};
pub use packet::{VideoTransCmd, VideoTransPacket, VIDEO_TRANS_PKT_LEN};
pub use relayer::{Heartbeat, NullRelayerEngine, RelayOutcome, RelayerEngine, RelayerHandle, RELAY_TIMEOUT_MS};
pub use url::{generate_url, split_url, UrlParseError};
