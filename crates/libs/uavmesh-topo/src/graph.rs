//! `TopoGraph` (spec.md §3, §4.10): the sink-only aggregated topology —
//! undirected adjacency, per-edge timeout eviction, and node positions.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uavmesh_core::{NodeIp, Position, Stoppable};

#[derive(Debug, Default)]
struct GraphState {
    adjacency: HashMap<NodeIp, HashSet<NodeIp>>,
}

impl GraphState {
    fn add_direct(&mut self, a: NodeIp, b: NodeIp) {
        self.adjacency.entry(a).or_default().insert(b);
    }

    fn remove_direct(&mut self, a: NodeIp, b: NodeIp) {
        if let Some(neighbors) = self.adjacency.get_mut(&a) {
            neighbors.remove(&b);
            if neighbors.is_empty() {
                self.adjacency.remove(&a);
            }
        }
    }
}

/// An unordered pair, so `{a, b}` and `{b, a}` hash and compare equal.
fn unordered(a: NodeIp, b: NodeIp) -> (NodeIp, NodeIp) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug)]
struct TimeoutRecord {
    pair: (NodeIp, NodeIp),
    at: Instant,
}

#[derive(Debug, Default)]
pub struct TopoGraph {
    graph: Mutex<GraphState>,
    timeout_record: Mutex<Vec<TimeoutRecord>>,
    pos_list: Mutex<HashMap<NodeIp, Position>>,
}

impl TopoGraph {
    pub fn new() -> Self {
        TopoGraph::default()
    }

    pub fn add_link(&self, a: NodeIp, b: NodeIp) {
        {
            let mut graph = self.graph.lock().expect("topo graph mutex poisoned");
            graph.add_direct(a, b);
            graph.add_direct(b, a);
        }
        self.update_timeout_record(a, b);
    }

    pub fn remove_link(&self, a: NodeIp, b: NodeIp) {
        let mut graph = self.graph.lock().expect("topo graph mutex poisoned");
        graph.remove_direct(a, b);
        graph.remove_direct(b, a);
    }

    fn update_timeout_record(&self, a: NodeIp, b: NodeIp) {
        let pair = unordered(a, b);
        let mut record = self.timeout_record.lock().expect("timeout record mutex poisoned");
        record.retain(|entry| entry.pair != pair);
        record.push(TimeoutRecord { pair, at: Instant::now() });
    }

    pub fn update_pos(&self, ip: NodeIp, position: Position) {
        self.pos_list.lock().expect("pos list mutex poisoned").insert(ip, position);
    }

    pub fn get_node_pos(&self, ip: NodeIp) -> Option<Position> {
        self.pos_list.lock().expect("pos list mutex poisoned").get(&ip).copied()
    }

    pub fn has_edge(&self, a: NodeIp, b: NodeIp) -> bool {
        self.graph
            .lock()
            .expect("topo graph mutex poisoned")
            .adjacency
            .get(&a)
            .is_some_and(|neighbors| neighbors.contains(&b))
    }

    pub fn node_count(&self) -> usize {
        self.graph.lock().expect("topo graph mutex poisoned").adjacency.len()
    }

    /// Node list in iteration order plus a `nodeCount x nodeCount` 0/1
    /// adjacency matrix consistent with that order (spec.md §4.10).
    /// `BTreeSet` ordering (by `NodeIp`) gives a deterministic node list
    /// rather than hash-iteration order, which the spec leaves
    /// unspecified but a test suite needs to be reproducible.
    pub fn to_matrix(&self) -> (Vec<NodeIp>, Vec<Vec<u8>>) {
        let graph = self.graph.lock().expect("topo graph mutex poisoned");
        let node_list: Vec<NodeIp> = graph.adjacency.keys().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let index_of: HashMap<NodeIp, usize> =
            node_list.iter().enumerate().map(|(i, ip)| (*ip, i)).collect();
        let n = node_list.len();
        let mut matrix = vec![vec![0u8; n]; n];
        for (src, neighbors) in graph.adjacency.iter() {
            let i = index_of[src];
            for dst in neighbors {
                matrix[i][index_of[dst]] = 1;
            }
        }
        (node_list, matrix)
    }

    /// Background eviction task (spec.md §4.10): walks `timeout_record`
    /// oldest-first, removing any edge whose timestamp exceeds
    /// `timeout`.
    pub async fn run_eviction(&self, timeout: Duration, stoppable: &Stoppable) {
        loop {
            tokio::select! {
                _ = stoppable.wait_for_stop() => return,
                _ = tokio::time::sleep(timeout) => self.evict_once(timeout),
            }
        }
    }

    fn evict_once(&self, timeout: Duration) {
        let now = Instant::now();
        let expired: Vec<(NodeIp, NodeIp)> = {
            let mut record = self.timeout_record.lock().expect("timeout record mutex poisoned");
            record.sort_by_key(|entry| entry.at);
            let mut expired = Vec::new();
            record.retain(|entry| {
                if now.duration_since(entry.at) > timeout {
                    expired.push(entry.pair);
                    false
                } else {
                    true
                }
            });
            expired
        };
        for (a, b) in expired {
            self.remove_link(a, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;

    fn ip(s: &str) -> NodeIp {
        NodeIp::from_str(s).unwrap()
    }

    #[test]
    fn add_link_is_bidirectional() {
        let graph = TopoGraph::new();
        graph.add_link(ip("10.0.0.1"), ip("10.0.0.2"));
        assert!(graph.has_edge(ip("10.0.0.1"), ip("10.0.0.2")));
        assert!(graph.has_edge(ip("10.0.0.2"), ip("10.0.0.1")));
    }

    #[test]
    fn remove_link_drops_empty_vertices() {
        let graph = TopoGraph::new();
        graph.add_link(ip("10.0.0.1"), ip("10.0.0.2"));
        graph.remove_link(ip("10.0.0.1"), ip("10.0.0.2"));
        assert!(!graph.has_edge(ip("10.0.0.1"), ip("10.0.0.2")));
        assert!(!graph.has_edge(ip("10.0.0.2"), ip("10.0.0.1")));
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn to_matrix_is_consistent_with_node_list() {
        let graph = TopoGraph::new();
        graph.add_link(ip("10.0.0.1"), ip("10.0.0.2"));
        graph.add_link(ip("10.0.0.2"), ip("10.0.0.3"));
        let (nodes, matrix) = graph.to_matrix();
        assert_eq!(nodes.len(), 3);
        let idx = |target: NodeIp| nodes.iter().position(|&n| n == target).unwrap();
        assert_eq!(matrix[idx(ip("10.0.0.1"))][idx(ip("10.0.0.2"))], 1);
        assert_eq!(matrix[idx(ip("10.0.0.2"))][idx(ip("10.0.0.1"))], 1);
        assert_eq!(matrix[idx(ip("10.0.0.1"))][idx(ip("10.0.0.3"))], 0);
    }

    #[test]
    fn update_pos_is_append_or_overwrite() {
        let graph = TopoGraph::new();
        graph.update_pos(ip("10.0.0.1"), Position::new(1.0, 1.0));
        graph.update_pos(ip("10.0.0.1"), Position::new(2.0, 2.0));
        assert_eq!(graph.get_node_pos(ip("10.0.0.1")), Some(Position::new(2.0, 2.0)));
    }

    /// S5 (spec.md §8): after `timeoutSec` with no refresh, both
    /// directions of a link are gone.
    #[tokio::test(start_paused = true)]
    async fn link_evicted_after_timeout_without_refresh() {
        let graph = Arc::new(TopoGraph::new());
        graph.add_link(ip("192.168.2.101"), ip("192.168.2.102"));
        let stoppable = Stoppable::new();

        let timeout = Duration::from_secs(5);
        let runner = {
            let graph = graph.clone();
            let stoppable = stoppable.clone();
            tokio::spawn(async move { graph.run_eviction(timeout, &stoppable).await })
        };

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert!(!graph.has_edge(ip("192.168.2.101"), ip("192.168.2.102")));

        stoppable.stop();
        let _ = tokio::time::timeout(Duration::from_secs(1), runner).await;
    }
}
