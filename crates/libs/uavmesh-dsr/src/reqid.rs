//! `ReqIdRecorder`: (srcIP, reqID) dedup set used exclusively to suppress
//! request-broadcast loops (spec.md §4.3). Grows monotonically for the
//! process lifetime; compaction is explicitly out of scope.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uavmesh_core::NodeIp;

#[derive(Debug, Default)]
pub struct ReqIdRecorder {
    seen: Mutex<HashMap<NodeIp, HashSet<u32>>>,
}

impl ReqIdRecorder {
    pub fn new() -> Self {
        ReqIdRecorder::default()
    }

    pub fn add(&self, src: NodeIp, req_id: u32) {
        self.seen
            .lock()
            .expect("reqid recorder mutex poisoned")
            .entry(src)
            .or_default()
            .insert(req_id);
    }

    pub fn exists(&self, src: NodeIp, req_id: u32) -> bool {
        self.seen
            .lock()
            .expect("reqid recorder mutex poisoned")
            .get(&src)
            .is_some_and(|ids| ids.contains(&req_id))
    }
}
