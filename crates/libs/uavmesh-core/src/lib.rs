//! Shared primitives for the UAV mesh control plane: the node IP newtype,
//! big-endian wire helpers, node configuration, typed errors, and the
//! cooperative-cancellation flag every long-lived task carries.

pub mod config;
pub mod error;
pub mod ip;
pub mod ports;
pub mod stoppable;
pub mod wire;

pub use config::{NodeConfig, NodeRole};
pub use error::{RouteError, SocketError, WireError};
pub use ip::{NodeIp, Position};
pub use stoppable::Stoppable;
