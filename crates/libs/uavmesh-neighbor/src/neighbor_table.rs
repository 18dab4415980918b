//! `NeighborTable` (spec.md §3, §4.7): a generational double-buffer that
//! ages out neighbors without ever touching the data structure on the hot
//! insert path — only an atomic slot index moves.
//!
//! `addNeighbor` always inserts into the slot named by `insertIndex`. A
//! single background task sleeps `timeoutSec`, clears the *inactive*
//! slot, then flips `insertIndex`. A neighbor heard just before a flip
//! survives until the *next* flip, so any entry is visible for between
//! `timeoutSec` and `2*timeoutSec` without a refresh (spec.md §8 inv. 5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uavmesh_core::{NodeIp, Position, Stoppable};

use crate::live_packet::LivePacket;

#[derive(Debug, Default)]
struct Slot {
    entries: Mutex<HashMap<NodeIp, Position>>,
}

#[derive(Debug, Default)]
pub struct NeighborTable {
    slots: [Slot; 2],
    insert_index: AtomicUsize,
}

impl NeighborTable {
    pub fn new() -> Self {
        NeighborTable::default()
    }

    fn active(&self) -> &Slot {
        &self.slots[self.insert_index.load(Ordering::Acquire) & 1]
    }

    fn inactive(&self) -> &Slot {
        &self.slots[(self.insert_index.load(Ordering::Acquire) + 1) & 1]
    }

    pub fn add_neighbor(&self, ip: NodeIp, position: Position) {
        self.active().entries.lock().expect("neighbor table mutex poisoned").insert(ip, position);
    }

    pub fn contains(&self, ip: NodeIp) -> bool {
        self.slots.iter().any(|slot| slot.entries.lock().expect("neighbor table mutex poisoned").contains_key(&ip))
    }

    pub fn count(&self) -> usize {
        self.merged().len()
    }

    /// Both slots merged, active slot winning on conflict (it holds the
    /// fresher sighting when a neighbor is present in both).
    pub fn merged(&self) -> HashMap<NodeIp, Position> {
        let active_idx = self.insert_index.load(Ordering::Acquire) & 1;
        let inactive_idx = active_idx ^ 1;
        let mut merged = self.slots[inactive_idx]
            .entries
            .lock()
            .expect("neighbor table mutex poisoned")
            .clone();
        merged.extend(self.slots[active_idx].entries.lock().expect("neighbor table mutex poisoned").iter());
        merged
    }

    /// Serializes both slots merged into caller-provided `LivePacket`
    /// records, as `neighbors2Buf` does (spec.md §4.7). Returns the
    /// neighbor count.
    pub fn to_live_packets(&self) -> Vec<LivePacket> {
        self.merged().into_iter().map(|(ip, position)| LivePacket::new(ip, position)).collect()
    }

    /// Flips the active slot after clearing the one that is about to
    /// become active (spec.md §4.7's `pktBroadcasting`/expiry thread).
    fn expire_once(&self) {
        let next_active = (self.insert_index.load(Ordering::Acquire) + 1) & 1;
        self.slots[next_active].entries.lock().expect("neighbor table mutex poisoned").clear();
        self.insert_index.store(next_active, Ordering::Release);
    }

    /// Background aging task (spec.md §4.7). Runs until `stoppable` is
    /// signalled.
    pub async fn run_expiry(&self, timeout: Duration, stoppable: &Stoppable) {
        loop {
            tokio::select! {
                _ = stoppable.wait_for_stop() => return,
                _ = tokio::time::sleep(timeout) => self.expire_once(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::Duration;

    fn ip(s: &str) -> NodeIp {
        NodeIp::from_str(s).unwrap()
    }

    #[test]
    fn contains_and_count_after_insert() {
        let table = NeighborTable::new();
        table.add_neighbor(ip("192.168.2.103"), Position::new(1.0, 2.0));
        assert!(table.contains(ip("192.168.2.103")));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn count_matches_union_of_both_slots() {
        let table = NeighborTable::new();
        table.add_neighbor(ip("192.168.2.103"), Position::new(1.0, 2.0));
        table.expire_once(); // old entry moves to inactive slot, still counted
        table.add_neighbor(ip("192.168.2.104"), Position::new(3.0, 4.0));
        assert_eq!(table.count(), 2);
        assert!(table.contains(ip("192.168.2.103")));
        assert!(table.contains(ip("192.168.2.104")));
    }

    #[test]
    fn second_expiry_without_refresh_drops_the_entry() {
        let table = NeighborTable::new();
        table.add_neighbor(ip("192.168.2.103"), Position::new(1.0, 2.0));
        table.expire_once();
        table.expire_once();
        assert!(!table.contains(ip("192.168.2.103")));
    }

    /// S4: a neighbor observed at t must remain visible through at least
    /// one expiry cycle and be gone by the second.
    #[tokio::test(start_paused = true)]
    async fn neighbor_ages_out_within_two_timeouts() {
        let table = Arc::new(NeighborTable::new());
        table.add_neighbor(ip("192.168.2.103"), Position::new(0.0, 0.0));
        let stoppable = Stoppable::new();

        let timeout = Duration::from_secs(2);
        let runner = {
            let table = table.clone();
            let stoppable = stoppable.clone();
            tokio::spawn(async move { table.run_expiry(timeout, &stoppable).await })
        };

        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert!(table.contains(ip("192.168.2.103")), "still visible within one timeoutSec");

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(!table.contains(ip("192.168.2.103")), "gone by 2*timeoutSec without a refresh");

        stoppable.stop();
        let _ = tokio::time::timeout(Duration::from_secs(1), runner).await;
    }
}
