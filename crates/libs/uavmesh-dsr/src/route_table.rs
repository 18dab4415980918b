//! `RouteTable`: destination → (next-hop, hop-count) (spec.md §4.2).
//!
//! Improvement-only update policy: insert if absent, replace only if the
//! new metric is strictly smaller. This is a deliberate trade-off (spec.md
//! §9) — callers that need freshness after a topology change must
//! `delete` the stale entry themselves and re-resolve with
//! `SEND_REQ_ANYWAY`.

use std::collections::HashMap;
use std::sync::Mutex;
use uavmesh_core::NodeIp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub next_hop: NodeIp,
    pub metric: u32,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    table: Mutex<HashMap<NodeIp, RouteEntry>>,
}

impl RouteTable {
    pub fn new() -> Self {
        RouteTable::default()
    }

    /// Inserts `dst → (next_hop, metric)` if absent, or replaces it if
    /// `metric` strictly improves on the cached entry. Returns `true` iff
    /// the table was modified.
    pub fn update(&self, dst: NodeIp, next_hop: NodeIp, metric: u32) -> bool {
        let mut table = self.table.lock().expect("route table mutex poisoned");
        match table.get(&dst) {
            Some(existing) if existing.metric <= metric => false,
            _ => {
                table.insert(dst, RouteEntry { next_hop, metric });
                true
            }
        }
    }

    pub fn find(&self, dst: NodeIp) -> Option<RouteEntry> {
        self.table.lock().expect("route table mutex poisoned").get(&dst).copied()
    }

    /// Explicit invalidation for stale-entry handling (spec.md §4.4 step
    /// 1). Returns `true` iff an entry was present and removed.
    pub fn delete(&self, dst: NodeIp) -> bool {
        self.table.lock().expect("route table mutex poisoned").remove(&dst).is_some()
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
    fn insert_into_empty_table_succeeds() {
        let table = RouteTable::new();
        assert!(table.update(ip("10.0.0.2"), ip("10.0.0.1"), 2));
        let entry = table.find(ip("10.0.0.2")).unwrap();
        assert_eq!(entry.next_hop, ip("10.0.0.1"));
        assert_eq!(entry.metric, 2);
    }

    #[test]
    fn worse_metric_is_rejected() {
        let table = RouteTable::new();
        table.update(ip("10.0.0.2"), ip("10.0.0.1"), 2);
        assert!(!table.update(ip("10.0.0.2"), ip("10.0.0.9"), 3));
        let entry = table.find(ip("10.0.0.2")).unwrap();
        assert_eq!(entry.metric, 2);
    }

    #[test]
    fn strictly_better_metric_replaces() {
        let table = RouteTable::new();
        table.update(ip("10.0.0.2"), ip("10.0.0.1"), 3);
        assert!(table.update(ip("10.0.0.2"), ip("10.0.0.5"), 1));
        let entry = table.find(ip("10.0.0.2")).unwrap();
        assert_eq!(entry.next_hop, ip("10.0.0.5"));
        assert_eq!(entry.metric, 1);
    }

    #[test]
    fn equal_metric_is_not_an_improvement() {
        let table = RouteTable::new();
        table.update(ip("10.0.0.2"), ip("10.0.0.1"), 2);
        assert!(!table.update(ip("10.0.0.2"), ip("10.0.0.9"), 2));
    }

    #[test]
    fn delete_removes_entry() {
        let table = RouteTable::new();
        table.update(ip("10.0.0.2"), ip("10.0.0.1"), 2);
        assert!(table.delete(ip("10.0.0.2")));
        assert!(table.find(ip("10.0.0.2")).is_none());
        assert!(!table.delete(ip("10.0.0.2")));
    }
}
