//! Wires `TopoGraph` into `uavmesh_neighbor`'s `TopologyIngest` seam
//! (spec.md §4.9's "sink parses into TopoGraph").

use uavmesh_core::{NodeIp, Position};
use uavmesh_neighbor::TopologyIngest;

use crate::graph::TopoGraph;

impl TopologyIngest for TopoGraph {
    fn ingest_report(&self, sender: NodeIp, neighbors: &[(NodeIp, Position)]) {
        for &(neighbor_ip, position) in neighbors {
            self.add_link(sender, neighbor_ip);
            self.update_pos(neighbor_ip, position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ip(s: &str) -> NodeIp {
        NodeIp::from_str(s).unwrap()
    }

    /// S5 (spec.md §8): a neighbor-report ingest links sender to each
    /// advertised neighbor and records that neighbor's position.
    #[test]
    fn ingest_report_links_sender_to_each_neighbor() {
        let graph = TopoGraph::new();
        graph.ingest_report(ip("192.168.2.101"), &[(ip("192.168.2.102"), Position::new(3.0, 4.0))]);
        assert!(graph.has_edge(ip("192.168.2.101"), ip("192.168.2.102")));
        assert!(graph.has_edge(ip("192.168.2.102"), ip("192.168.2.101")));
        assert_eq!(graph.get_node_pos(ip("192.168.2.102")), Some(Position::new(3.0, 4.0)));
    }
}
