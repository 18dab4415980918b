//! Seam between the neighbor-report listener and whatever aggregates
//! reports at the sink (spec.md §4.9, §4.10). Kept as a trait here so
//! this crate never depends on `uavmesh-topo`; the topology crate
//! implements it for `TopoGraph`.

use uavmesh_core::{NodeIp, Position};

pub trait TopologyIngest: Send + Sync {
    /// A neighbor-report arrived from `sender`, advertising `neighbors`.
    /// Implementations link `sender` to every advertised neighbor and
    /// record each neighbor's position (spec.md §4.9 step "sink parses
    /// into TopoGraph").
    fn ingest_report(&self, sender: NodeIp, neighbors: &[(NodeIp, Position)]);
}
