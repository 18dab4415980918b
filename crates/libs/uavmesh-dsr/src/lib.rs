//! Reactive source-route discovery: the DSR packet codec, route table,
//! request-id dedup set, wait-map, resolver (`getNextHop`), and listener
//! (spec.md §4.1–§4.5).

pub mod broadcast;
pub mod listener;
pub mod packet;
pub mod reqid;
pub mod resolver;
pub mod route_table;
pub mod wait_map;

pub use broadcast::{BroadcastTarget, UnicastResolver};
pub use listener::DsrListener;
pub use packet::{DsrPacketType, DsrRoutePacket, DSR_HEADER_LEN};
pub use reqid::ReqIdRecorder;
pub use resolver::{DsrResolver, ResolveMode};
pub use route_table::{RouteEntry, RouteTable};
pub use wait_map::{EnterOutcome, WaitMap, WaitState};
